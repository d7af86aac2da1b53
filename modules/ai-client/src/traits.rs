use anyhow::Result;
use async_trait::async_trait;

/// A chat model that turns a system + user prompt into free text.
///
/// Output is untrusted: callers that need structure must parse it themselves.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn chat_completion(&self, system: &str, user: &str) -> Result<String>;

    /// Provider/model label for logs.
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat_completion("You are a helpful assistant.", prompt)
            .await
    }
}

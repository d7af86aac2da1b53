//! LLM-backed candidate evaluator.
//!
//! One completion call per hit. The model is asked for a single JSON object
//! matching [`JudgmentReply`]; whatever comes back is handed to the parser
//! untouched.

use std::sync::Arc;

use ai_client::TextCompletion;
use anyhow::Result;
use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use tracing::debug;

use crate::traits::CandidateEvaluator;

/// Shape the evaluator is asked to reply with. Only used to render the
/// schema into the system prompt; parsing is lenient and lives in the parser.
#[derive(JsonSchema)]
struct JudgmentReply {
    /// Creator or channel name as it appears on the page.
    name: String,
    /// Fit with the requirement, integer from 1 (no fit) to 10 (perfect fit).
    score: u8,
    /// One or two sentences explaining the score.
    reason: String,
    /// Email, social handle or contact page, if the content shows one.
    contact: Option<String>,
    /// Short topic tags for the creator's niche.
    tags: Vec<String>,
    /// A short, friendly first outreach message addressed to the creator.
    outreach_draft: Option<String>,
}

const EVALUATOR_SYSTEM: &str = "\
You screen web content for brand partnerships. Given a partnership requirement \
and content from one web page or search result, decide whether the page belongs \
to a content creator (YouTuber, blogger, reviewer, streamer, podcaster) who fits \
the requirement.\n\n\
Scoring:\n\
- 8-10: the creator clearly covers this niche and would be a strong partner\n\
- 5-7: related audience or adjacent topics\n\
- 1-4: unrelated, a store, a news aggregator, or no identifiable creator\n\n\
Use the creator's own name, not the site's. If no creator can be identified, \
use the page title as the name and score 1.\n\
Reply with exactly one JSON object and nothing else. It must match this schema:\n";

pub struct LlmEvaluator {
    llm: Arc<dyn TextCompletion>,
    system: String,
}

impl LlmEvaluator {
    pub fn new(llm: Arc<dyn TextCompletion>) -> Self {
        let schema = serde_json::to_string_pretty(&schema_for!(JudgmentReply)).unwrap_or_default();
        Self {
            llm,
            system: format!("{EVALUATOR_SYSTEM}{schema}"),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system
    }
}

fn user_prompt(requirement: &str, content: &str) -> String {
    format!("Requirement: {requirement}\n\nContent:\n{content}")
}

#[async_trait]
impl CandidateEvaluator for LlmEvaluator {
    async fn evaluate(&self, requirement: &str, content: &str) -> Result<String> {
        debug!(model = self.llm.model(), "Requesting judgment");
        self.llm
            .chat_completion(&self.system, &user_prompt(requirement, content))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::pipeline::parser;

    struct RecordingLlm {
        reply: String,
        prompts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl TextCompletion for RecordingLlm {
        async fn chat_completion(&self, system: &str, user: &str) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string()));
            Ok(self.reply.clone())
        }

        fn model(&self) -> &str {
            "recording"
        }
    }

    #[test]
    fn system_prompt_embeds_schema_fields() {
        let llm = Arc::new(RecordingLlm {
            reply: String::new(),
            prompts: Mutex::new(Vec::new()),
        });
        let evaluator = LlmEvaluator::new(llm);
        let prompt = evaluator.system_prompt();
        for field in ["name", "score", "reason", "contact", "tags", "outreach_draft"] {
            assert!(prompt.contains(&format!("\"{field}\"")), "missing {field}");
        }
        assert!(prompt.contains("exactly one JSON object"));
    }

    #[tokio::test]
    async fn passes_requirement_and_content_and_returns_raw_text() {
        let reply = "```json\n{\"name\":\"Quiet Keys\",\"score\":\"8\",\"reason\":\"reviews keyboards\"}\n```";
        let llm = Arc::new(RecordingLlm {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let evaluator = LlmEvaluator::new(llm.clone());

        let raw = evaluator
            .evaluate("ergonomic keyboards", "Quiet keyboard reviews")
            .await
            .unwrap();
        assert_eq!(raw, reply);
        assert_eq!(parser::parse(&raw).unwrap().score, 8);

        let prompts = llm.prompts.lock().unwrap();
        let (_, user) = &prompts[0];
        assert!(user.contains("Requirement: ergonomic keyboards"));
        assert!(user.ends_with("Quiet keyboard reviews"));
    }
}

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rand::Rng;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use creator_scout_common::PageContent;

use crate::traits::ContentFetcher;

/// Max concurrent Chromium processes. Each instance is heavy (~100MB+ RSS,
/// multiple child processes).
const MAX_CONCURRENT_CHROME: usize = 2;

/// Attempts for transient Chrome failures (fork exhaustion, empty DOM, timeout).
const CHROME_MAX_ATTEMPTS: u32 = 3;
/// Base backoff for Chrome retries. Actual delay is base * 3^attempt + jitter.
const CHROME_RETRY_BASE: Duration = Duration::from_secs(3);

const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

fn ensure_http_url(url: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(url).context("Invalid URL")?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        bail!("Only http/https URLs are allowed, got: {}", parsed.scheme());
    }
    Ok(parsed)
}

/// Readability extraction of the main content of an HTML document.
pub fn extract_readable(url: Option<&url::Url>, html: &[u8]) -> String {
    let config = TransformConfig {
        readability: true,
        main_content: true,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url,
        content: html,
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };
    transform_content_input(input, &config)
}

// --- Chrome + Readability fetcher ---

/// Headless Chromium `--dump-dom` for JS-rendered pages, then Readability.
///
/// Bounds its own duration: each attempt gets `attempt_timeout`, counted
/// from when a browser slot is acquired, so queueing for a slot is never a
/// fetch failure.
pub struct ChromeFetcher {
    chrome_bin: String,
    char_cap: usize,
    attempt_timeout: Duration,
    semaphore: Semaphore,
}

impl ChromeFetcher {
    pub fn new(chrome_bin: impl Into<String>, char_cap: usize, attempt_timeout: Duration) -> Self {
        info!(
            attempt_timeout_secs = attempt_timeout.as_secs(),
            "Using ChromeFetcher (dump-dom + Readability extraction, max_concurrent={MAX_CONCURRENT_CHROME})"
        );
        Self {
            chrome_bin: chrome_bin.into(),
            char_cap,
            attempt_timeout,
            semaphore: Semaphore::new(MAX_CONCURRENT_CHROME),
        }
    }

    async fn backoff(url: &str, attempt: u32, cause: &str) {
        let backoff = CHROME_RETRY_BASE * 3u32.pow(attempt);
        let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
        warn!(
            url,
            attempt = attempt + 1,
            backoff_secs = backoff.as_secs(),
            cause,
            "Chrome attempt failed, retrying after backoff"
        );
        tokio::time::sleep(backoff + jitter).await;
    }

    /// Launch Chrome --dump-dom and return raw stdout bytes. Empty output
    /// after the final attempt is returned as-is.
    async fn dump_dom(&self, url: &str) -> Result<Vec<u8>> {
        ensure_http_url(url)?;

        for attempt in 0..CHROME_MAX_ATTEMPTS {
            let retry = attempt + 1 < CHROME_MAX_ATTEMPTS;
            let tmp_dir = tempfile::tempdir().context("Failed to create temp profile dir")?;

            let result = tokio::time::timeout(
                self.attempt_timeout,
                tokio::process::Command::new(&self.chrome_bin)
                    .args([
                        "--headless",
                        "--no-sandbox",
                        "--disable-gpu",
                        "--disable-dev-shm-usage",
                        &format!("--user-agent={DESKTOP_USER_AGENT}"),
                        &format!("--user-data-dir={}", tmp_dir.path().display()),
                        "--dump-dom",
                        url,
                    ])
                    .kill_on_drop(true)
                    .output(),
            )
            .await;

            match result {
                Ok(Ok(output)) if output.status.success() => {
                    if output.stdout.is_empty() && retry {
                        Self::backoff(url, attempt, "empty DOM").await;
                        continue;
                    }
                    return Ok(output.stdout);
                }
                Ok(Ok(output)) => {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    if is_transient(&stderr) && retry {
                        Self::backoff(url, attempt, "cannot fork").await;
                        continue;
                    }
                    warn!(url, fetcher = "chrome", stderr = %stderr, "Chrome exited with error");
                    return Ok(Vec::new());
                }
                Ok(Err(e)) => {
                    if is_transient(&e.to_string()) && retry {
                        Self::backoff(url, attempt, "launch failed").await;
                        continue;
                    }
                    bail!("Failed to run Chrome for {url}: {e}");
                }
                Err(_) => {
                    if retry {
                        Self::backoff(url, attempt, "timeout").await;
                        continue;
                    }
                    bail!(
                        "Chrome timed out after {}s for {url}",
                        self.attempt_timeout.as_secs()
                    );
                }
            }
        }

        Ok(Vec::new())
    }
}

fn is_transient(message: &str) -> bool {
    message.contains("Cannot fork") || message.contains("Resource temporarily unavailable")
}

#[async_trait]
impl ContentFetcher for ChromeFetcher {
    async fn fetch(&self, url: &str) -> Result<PageContent> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| anyhow::anyhow!("Chrome semaphore closed"))?;

        info!(url, fetcher = "chrome", "Fetching URL");

        let html = self.dump_dom(url).await?;
        if html.is_empty() {
            bail!("Empty DOM output for {url}");
        }

        let parsed_url = url::Url::parse(url).ok();
        let page = PageContent::new(url, &extract_readable(parsed_url.as_ref(), &html), self.char_cap);
        if page.is_empty() {
            bail!("Empty content after Readability extraction for {url}");
        }

        info!(url, fetcher = "chrome", chars = page.text.chars().count(), "Fetched successfully");
        Ok(page)
    }

    fn name(&self) -> &str {
        "chrome"
    }

    fn bounds_own_duration(&self) -> bool {
        true
    }
}

// --- Plain HTTP + Readability fetcher ---

/// Static-HTML fetcher for pages that render without JavaScript.
pub struct HttpFetcher {
    client: reqwest::Client,
    char_cap: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, char_cap: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DESKTOP_USER_AGENT)
            .build()
            .context("Failed to build page HTTP client")?;
        Ok(Self { client, char_cap })
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<PageContent> {
        let parsed = ensure_http_url(url)?;
        info!(url, fetcher = "http", "Fetching URL");

        let html = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?
            .error_for_status()
            .with_context(|| format!("GET {url} returned an error status"))?
            .bytes()
            .await
            .with_context(|| format!("Failed to read body of {url}"))?;

        let page = PageContent::new(url, &extract_readable(Some(&parsed), &html), self.char_cap);
        if page.is_empty() {
            bail!("Empty content after Readability extraction for {url}");
        }

        info!(url, fetcher = "http", chars = page.text.chars().count(), "Fetched successfully");
        Ok(page)
    }

    fn name(&self) -> &str {
        "http"
    }
}

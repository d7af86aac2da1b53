//! Requirement → search queries, via one LLM call.

use std::collections::HashSet;
use std::sync::Arc;

use ai_client::util::strip_code_blocks;
use ai_client::TextCompletion;
use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::info;

use crate::traits::QueryPlanner;

const PLANNER_SYSTEM: &str = "\
You write web search queries that surface individual content creators for a \
brand partnership. Spread the queries across channels: YouTube channels, \
niche media and review sites, and personal blogs. Each query should be what a \
person would type into a search engine, at most ten words.\n\
Reply with one query per line and nothing else: no numbering, no quotes, no \
commentary.";

pub struct LlmQueryPlanner {
    llm: Arc<dyn TextCompletion>,
}

impl LlmQueryPlanner {
    pub fn new(llm: Arc<dyn TextCompletion>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl QueryPlanner for LlmQueryPlanner {
    async fn plan(&self, requirement: &str, count: usize) -> Result<Vec<String>> {
        let prompt = format!("Write {count} search queries for this requirement:\n{requirement}");
        let reply = self.llm.chat_completion(PLANNER_SYSTEM, &prompt).await?;

        let queries = parse_query_lines(&reply, count);
        if queries.is_empty() {
            bail!("planner returned no usable queries");
        }
        info!(model = self.llm.model(), queries = ?queries, "Queries planned");
        Ok(queries)
    }
}

/// Pull up to `count` distinct queries out of a line-per-query reply.
///
/// Tolerates code fences, list markers ("1.", "2)", "-", "*") and wrapping
/// quotes. Duplicates are dropped case-insensitively, first wins.
pub fn parse_query_lines(reply: &str, count: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    strip_code_blocks(reply)
        .lines()
        .map(clean_line)
        .filter(|q| !q.is_empty())
        .filter(|q| seen.insert(q.to_lowercase()))
        .take(count)
        .collect()
}

fn clean_line(line: &str) -> String {
    let mut s = line.trim();
    s = s.trim_start_matches(['-', '*', '•']).trim_start();

    let digits = s.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &s[digits..];
        if let Some(stripped) = rest.strip_prefix(['.', ')', ':']) {
            s = stripped.trim_start();
        }
    }

    s.trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}

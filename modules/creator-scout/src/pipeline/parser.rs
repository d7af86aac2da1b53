//! Evaluator result parser.
//!
//! The evaluator is a natural-language service: it may wrap its JSON in
//! prose or code fences, use string scores, or omit optional fields. This
//! module is the only path from its raw text to a [`Candidate`].

use serde_json::{Map, Value};

use creator_scout_common::{Candidate, ParseError, MAX_SCORE, MIN_SCORE};

/// A validated judgment, not yet bound to a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Judgment {
    pub name: String,
    pub score: u8,
    pub reason: String,
    pub outreach_draft: Option<String>,
    pub contact: Option<String>,
    pub tags: Vec<String>,
}

impl Judgment {
    pub fn into_candidate(self, url: impl Into<String>) -> Candidate {
        Candidate {
            name: self.name,
            score: self.score,
            reason: self.reason,
            outreach_draft: self.outreach_draft,
            contact: self.contact,
            tags: self.tags,
            url: url.into(),
        }
    }
}

/// Keys accepted for the outreach draft, in priority order.
const OUTREACH_KEYS: [&str; 3] = ["outreach_draft", "outreachDraft", "email_draft"];

/// Parse raw evaluator text into a validated judgment.
pub fn parse(raw: &str) -> Result<Judgment, ParseError> {
    let object = find_first_object(raw).ok_or(ParseError::NoStructureFound)?;
    validate(&object)
}

/// Return the first `{` position from which a complete JSON object deserializes.
fn find_first_object(raw: &str) -> Option<Map<String, Value>> {
    raw.match_indices('{').find_map(|(idx, _)| {
        let mut stream = serde_json::Deserializer::from_str(&raw[idx..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}

fn validate(object: &Map<String, Value>) -> Result<Judgment, ParseError> {
    let name = required_string(object, "name")?;
    if name.is_empty() {
        return Err(ParseError::MissingField("name"));
    }

    let score = match object.get("score") {
        None | Some(Value::Null) => return Err(ParseError::MissingField("score")),
        Some(value) => coerce_score(value)?,
    };

    let reason = required_string(object, "reason")?;

    let outreach_draft = OUTREACH_KEYS
        .iter()
        .find_map(|key| optional_string(object, key));

    Ok(Judgment {
        name,
        score,
        reason,
        outreach_draft,
        contact: optional_string(object, "contact"),
        tags: tags(object),
    })
}

/// Absent, null, or non-string values all count as missing.
fn required_string(object: &Map<String, Value>, key: &'static str) -> Result<String, ParseError> {
    match object.get(key) {
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        _ => Err(ParseError::MissingField(key)),
    }
}

fn optional_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Out-of-range scores are rejected, never clamped.
fn coerce_score(value: &Value) -> Result<u8, ParseError> {
    let score = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i
            } else {
                let f = n.as_f64().ok_or(ParseError::InvalidScore)?;
                if f.fract() != 0.0 {
                    return Err(ParseError::InvalidScore);
                }
                f as i64
            }
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| ParseError::InvalidScore)?,
        _ => return Err(ParseError::InvalidScore),
    };

    if (i64::from(MIN_SCORE)..=i64::from(MAX_SCORE)).contains(&score) {
        Ok(score as u8)
    } else {
        Err(ParseError::InvalidScore)
    }
}

/// Tags may arrive as an array of strings or a single comma-separated string.
fn tags(object: &Map<String, Value>) -> Vec<String> {
    let raw: Vec<String> = match object.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_object_wrapped_in_prose() {
        let judgment =
            parse(r#"Sure! Here you go: {"name":"A","score":7,"reason":"fit"}"#).unwrap();
        assert_eq!(judgment.name, "A");
        assert_eq!(judgment.score, 7);
        assert_eq!(judgment.reason, "fit");
        assert_eq!(judgment.contact, None);
        assert_eq!(judgment.outreach_draft, None);
        assert!(judgment.tags.is_empty());
    }

    #[test]
    fn no_object_is_no_structure_found() {
        assert_eq!(
            parse("I could not find a creator on this page."),
            Err(ParseError::NoStructureFound)
        );
        assert_eq!(parse(""), Err(ParseError::NoStructureFound));
    }

    #[test]
    fn missing_score_is_missing_field() {
        assert_eq!(
            parse(r#"{"name":"A","reason":"fit"}"#),
            Err(ParseError::MissingField("score"))
        );
    }

    #[test]
    fn empty_name_is_missing_field() {
        assert_eq!(
            parse(r#"{"name":"  ","score":5,"reason":"fit"}"#),
            Err(ParseError::MissingField("name"))
        );
    }

    #[test]
    fn missing_reason_is_missing_field() {
        assert_eq!(
            parse(r#"{"name":"A","score":5}"#),
            Err(ParseError::MissingField("reason"))
        );
    }

    #[test]
    fn out_of_range_scores_are_rejected_not_clamped() {
        assert_eq!(
            parse(r#"{"name":"A","score":11,"reason":"r"}"#),
            Err(ParseError::InvalidScore)
        );
        assert_eq!(
            parse(r#"{"name":"A","score":0,"reason":"r"}"#),
            Err(ParseError::InvalidScore)
        );
        assert_eq!(
            parse(r#"{"name":"A","score":-3,"reason":"r"}"#),
            Err(ParseError::InvalidScore)
        );
    }

    #[test]
    fn score_coercion() {
        assert_eq!(parse(r#"{"name":"A","score":"8","reason":"r"}"#).unwrap().score, 8);
        assert_eq!(parse(r#"{"name":"A","score":6.0,"reason":"r"}"#).unwrap().score, 6);
        assert_eq!(
            parse(r#"{"name":"A","score":6.5,"reason":"r"}"#),
            Err(ParseError::InvalidScore)
        );
        assert_eq!(
            parse(r#"{"name":"A","score":"high","reason":"r"}"#),
            Err(ParseError::InvalidScore)
        );
        assert_eq!(
            parse(r#"{"name":"A","score":[7],"reason":"r"}"#),
            Err(ParseError::InvalidScore)
        );
    }

    #[test]
    fn skips_unbalanced_braces_before_the_object() {
        let raw = "Scores use {1-10}. Result:\n```json\n{\"name\":\"Keeb Lab\",\"score\":9,\"reason\":\"reviews boards\"}\n```";
        let judgment = parse(raw).unwrap();
        assert_eq!(judgment.name, "Keeb Lab");
        assert_eq!(judgment.score, 9);
    }

    #[test]
    fn first_object_wins() {
        let raw = r#"{"name":"First","score":4,"reason":"a"} and {"name":"Second","score":9,"reason":"b"}"#;
        assert_eq!(parse(raw).unwrap().name, "First");
    }

    #[test]
    fn nested_objects_are_not_mistaken_for_the_answer() {
        let raw = r#"{"name":"A","score":7,"reason":"fit","meta":{"source":"x"}}"#;
        assert_eq!(parse(raw).unwrap().name, "A");
    }

    #[test]
    fn optional_fields_are_read() {
        let raw = r#"{
            "name": "Desk Setup Daily",
            "score": 8,
            "reason": "Reviews quiet keyboards",
            "contact": "hello@desksetup.example",
            "tags": ["keyboards", " ergonomics ", ""],
            "email_draft": "Hi there!"
        }"#;
        let judgment = parse(raw).unwrap();
        assert_eq!(judgment.contact.as_deref(), Some("hello@desksetup.example"));
        assert_eq!(judgment.tags, vec!["keyboards", "ergonomics"]);
        assert_eq!(judgment.outreach_draft.as_deref(), Some("Hi there!"));
    }

    #[test]
    fn comma_separated_tags_and_outreach_key_priority() {
        let raw = r#"{"name":"A","score":5,"reason":"r","tags":"tech, mech keys","outreach_draft":"one","email_draft":"two"}"#;
        let judgment = parse(raw).unwrap();
        assert_eq!(judgment.tags, vec!["tech", "mech keys"]);
        assert_eq!(judgment.outreach_draft.as_deref(), Some("one"));
    }

    #[test]
    fn into_candidate_attaches_url() {
        let candidate = parse(r#"{"name":"A","score":7,"reason":"fit"}"#)
            .unwrap()
            .into_candidate("https://x.com/p");
        assert_eq!(candidate.url, "https://x.com/p");
        assert_eq!(candidate.score, 7);
    }
}

use std::collections::HashSet;
use std::sync::Mutex;

/// Per-run set of claimed URLs. Membership only grows; a new set is built for
/// every run.
#[derive(Debug, Default)]
pub struct DedupSet {
    claimed: Mutex<HashSet<String>>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `url`. Returns `true` for exactly one caller per URL;
    /// later callers get `false` and the set is left untouched.
    pub fn try_claim(&self, url: &str) -> bool {
        let key = url.trim();
        self.claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string())
    }

    pub fn len(&self) -> usize {
        self.claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

use creator_scout_common::Candidate;

/// Rank candidates by score, highest first. Each candidate carries the
/// sequence number its URL was dispatched with; equal scores are ordered by
/// it, so the result does not depend on which evaluation finished first.
pub fn aggregate(mut candidates: Vec<(u32, Candidate)>) -> Vec<Candidate> {
    candidates.sort_by(|(seq_a, a), (seq_b, b)| b.score.cmp(&a.score).then(seq_a.cmp(seq_b)));
    candidates.into_iter().map(|(_, candidate)| candidate).collect()
}

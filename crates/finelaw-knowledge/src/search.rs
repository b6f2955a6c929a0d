//! Cosine ranking and context rendering.

use finelaw_core::error::{FineLawError, Result};
use serde::{Deserialize, Serialize};

/// One ranked hit from a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub text: String,
    /// Cosine distance to the query, `1 - cos_sim`; lower is closer.
    pub distance: f32,
}

/// `1 - cos(a, b)`. Zero vectors are treated as maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// A stored row awaiting ranking.
pub(crate) struct Candidate {
    pub id: String,
    pub title: String,
    pub text: String,
    pub vector: Vec<f32>,
}

/// Rank candidates by ascending distance and keep the first `top_k`.
///
/// The sort is stable, so equal distances keep insertion order.
pub(crate) fn rank(query: &[f32], candidates: Vec<Candidate>, top_k: usize) -> Result<Vec<SearchResult>> {
    let mut scored = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if candidate.vector.len() != query.len() {
            return Err(FineLawError::DimensionMismatch {
                expected: candidate.vector.len(),
                actual: query.len(),
            });
        }
        let distance = cosine_distance(query, &candidate.vector);
        scored.push(SearchResult {
            id: candidate.id,
            title: candidate.title,
            text: candidate.text,
            distance,
        });
    }
    scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    scored.truncate(top_k);
    Ok(scored)
}

/// Collapse blank-line runs the way the index has always done it: two
/// non-overlapping `"\n\n"` → `"\n"` passes. Runs of five or more newlines
/// still leave a blank line behind.
pub fn collapse_blank_lines(text: &str) -> String {
    text.replace("\n\n", "\n").replace("\n\n", "\n")
}

/// Title, cleaned text and a separator for every hit, in rank order.
pub fn render_context(results: &[SearchResult]) -> String {
    let mut context = String::new();
    for result in results {
        context.push_str(&result.title);
        context.push('\n');
        context.push_str(&collapse_blank_lines(&result.text));
        context.push('\n');
    }
    context
}

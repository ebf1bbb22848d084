use tracing::{debug, info};

use crate::error::ResolveError;

use super::snapshot::SnapshotCache;
use super::types::{Candidate, Resolution, Snapshot};

/// True for a canonical 6-digit instrument code.
pub fn is_code(query: &str) -> bool {
    query.len() == 6 && query.bytes().all(|b| b.is_ascii_digit())
}

/// Maps free text (code or name fragment) to ranked candidates in `snapshot`.
///
/// Several matches are ranked by descending traded value, rows without one
/// last, and cut to `top_n`. The first candidate is the default selection.
pub fn resolve_in(snapshot: &Snapshot, query: &str, top_n: usize) -> Result<Resolution, ResolveError> {
    let q = query.trim();
    if q.is_empty() {
        return Err(ResolveError::EmptyQuery);
    }

    let mut hits: Vec<Candidate> = if is_code(q) {
        snapshot
            .rows
            .iter()
            .filter(|row| row.code == q)
            .map(Candidate::from)
            .collect()
    } else {
        let needle = q.to_lowercase();
        snapshot
            .rows
            .iter()
            .filter(|row| row.name.to_lowercase().contains(&needle))
            .map(Candidate::from)
            .collect()
    };

    if hits.is_empty() {
        return Err(ResolveError::NoMatch {
            query: query.to_string(),
        });
    }

    if hits.len() > 1 {
        // Stable: equal traded values keep snapshot order
        hits.sort_by(|a, b| rank_key(b).total_cmp(&rank_key(a)));
        hits.truncate(top_n.max(1));
    }

    let primary = hits[0].clone();
    Ok(Resolution {
        primary,
        candidates: hits,
    })
}

fn rank_key(candidate: &Candidate) -> f64 {
    candidate.traded_value.unwrap_or(f64::NEG_INFINITY)
}

/// Resolves queries against the shared snapshot cache.
#[derive(Clone)]
pub struct SymbolResolver {
    cache: SnapshotCache,
}

impl SymbolResolver {
    pub fn new(cache: SnapshotCache) -> Self {
        Self { cache }
    }

    pub async fn resolve(&self, query: &str, top_n: usize) -> Result<Resolution, ResolveError> {
        if query.trim().is_empty() {
            return Err(ResolveError::EmptyQuery);
        }

        let snapshot = self.cache.get().await?;
        let resolution = resolve_in(&snapshot, query, top_n)?;

        if resolution.candidates.len() > 1 {
            info!(
                "[RESOLVE] '{}' matched {} candidates, defaulting to {} {}",
                query.trim(),
                resolution.candidates.len(),
                resolution.primary.code,
                resolution.primary.name
            );
        } else {
            debug!("[RESOLVE] '{}' -> {} {}", query.trim(), resolution.primary.code, resolution.primary.name);
        }
        Ok(resolution)
    }
}

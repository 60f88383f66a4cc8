use std::collections::HashMap;

use tutor_core::settings::DedupSettings;
use tutor_core::types::{FusedResult, RetrievalHit, SourceKind};

/// Merges hits gathered across query variants into one ranked list.
///
/// Each chunk keeps its best raw score plus a capped bonus for every list
/// that surfaced it: `max + min(max_bonus, occurrence_bonus * count)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Deduplicator {
    occurrence_bonus: f32,
    max_bonus: f32,
}

impl Default for Deduplicator {
    fn default() -> Self { Self::from_settings(&DedupSettings::default()) }
}

impl Deduplicator {
    pub fn new(occurrence_bonus: f32, max_bonus: f32) -> Self { Self { occurrence_bonus, max_bonus } }

    pub fn from_settings(settings: &DedupSettings) -> Self { Self::new(settings.occurrence_bonus, settings.max_bonus) }

    pub fn dedupe(&self, hits: &[RetrievalHit], top_k: usize) -> Vec<FusedResult> {
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<FusedResult> = Vec::new();
        for hit in hits {
            let id = hit.chunk.identity();
            match slots.get(&id) {
                Some(&slot) => {
                    let group = &mut groups[slot];
                    group.score = group.score.max(hit.score);
                    group.occurrences += 1;
                    if group.source != hit.source {
                        group.source = SourceKind::Fused;
                    }
                }
                None => {
                    slots.insert(id, groups.len());
                    groups.push(FusedResult {
                        score: hit.score,
                        chunk: hit.chunk.clone(),
                        source: hit.source,
                        occurrences: 1,
                    });
                }
            }
        }

        for group in &mut groups {
            let bonus = (self.occurrence_bonus * group.occurrences as f32).min(self.max_bonus);
            group.score = (group.score + bonus).max(0.0);
        }
        groups.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        groups.truncate(top_k);
        groups
    }
}

// Reciprocal Rank Fusion (RRF)

use std::collections::HashMap;

use tutor_core::types::{RetrievalHit, SourceKind};

/// Conventional RRF constant (Cormack, Clarke and Buettcher, SIGIR 2009).
/// Larger values flatten the influence of rank.
pub const DEFAULT_RRF_K: f32 = 60.0;

/// Fuses ranked lists produced for the same query by different retrievers.
///
/// `score(d) = sum over lists containing d of 1 / (rrf_k + rank)`, rank
/// 1-based. Chunks are matched by `Chunk::identity`, so vector and BM25
/// scores never need to share a scale. Ties keep first-seen order.
///
/// With a single non-empty list the hits are returned as they are,
/// truncated to `k`.
pub fn reciprocal_rank_fusion(lists: &[Vec<RetrievalHit>], rrf_k: f32, k: usize) -> Vec<RetrievalHit> {
    let mut non_empty = lists.iter().filter(|l| !l.is_empty());
    let (Some(first), second) = (non_empty.next(), non_empty.next()) else {
        return Vec::new();
    };
    if second.is_none() {
        return first.iter().take(k).cloned().collect();
    }

    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut fused: Vec<RetrievalHit> = Vec::new();
    for list in lists {
        for (rank, hit) in list.iter().enumerate() {
            let contribution = 1.0 / (rrf_k + (rank + 1) as f32);
            let id = hit.chunk.identity();
            match slots.get(&id) {
                Some(&slot) => fused[slot].score += contribution,
                None => {
                    slots.insert(id, fused.len());
                    fused.push(RetrievalHit::new(contribution, hit.chunk.clone(), SourceKind::Fused));
                }
            }
        }
    }

    // `sort_by` is stable, so equal scores stay in first-seen order.
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused.truncate(k);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tutor_core::types::Chunk;

    fn hit(id: &str, score: f32, source: SourceKind) -> RetrievalHit {
        let chunk = Chunk { id: Some(id.into()), source: "doc.pdf".into(), page: 1, chunk_index: 0, text: id.into() };
        RetrievalHit::new(score, Arc::new(chunk), source)
    }

    fn ids(hits: &[RetrievalHit]) -> Vec<String> { hits.iter().map(|h| h.chunk.identity()).collect() }

    #[test]
    fn shared_chunk_sums_reciprocal_ranks() {
        let vector = vec![hit("a", 0.9, SourceKind::Vector), hit("b", 0.8, SourceKind::Vector), hit("c", 0.7, SourceKind::Vector)];
        let lexical = vec![hit("c", 12.0, SourceKind::Lexical), hit("a", 8.0, SourceKind::Lexical), hit("d", 5.0, SourceKind::Lexical)];

        let fused = reciprocal_rank_fusion(&[vector, lexical], 60.0, 10);
        assert_eq!(ids(&fused), vec!["a", "c", "b", "d"]);

        let a = 1.0 / 61.0 + 1.0 / 62.0;
        assert!((fused[0].score - a).abs() < 1e-7);
        assert!(fused[0].score > 1.0 / 61.0);
        assert!(fused.iter().all(|h| h.source == SourceKind::Fused));
    }

    #[test]
    fn single_list_is_returned_unfused() {
        let vector = vec![hit("a", 0.9, SourceKind::Vector), hit("b", 0.8, SourceKind::Vector), hit("c", 0.1, SourceKind::Vector)];
        let fused = reciprocal_rank_fusion(&[vector, Vec::new()], 60.0, 2);
        assert_eq!(ids(&fused), vec!["a", "b"]);
        assert_eq!(fused[0].score, 0.9);
        assert_eq!(fused[0].source, SourceKind::Vector);
    }

    #[test]
    fn empty_inputs_fuse_to_nothing() {
        assert!(reciprocal_rank_fusion(&[Vec::new(), Vec::new()], 60.0, 5).is_empty());
        assert!(reciprocal_rank_fusion(&[], 60.0, 5).is_empty());
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let vector = vec![hit("a", 0.9, SourceKind::Vector)];
        let lexical = vec![hit("b", 3.0, SourceKind::Lexical)];
        let fused = reciprocal_rank_fusion(&[vector, lexical], 60.0, 5);
        assert_eq!(ids(&fused), vec!["a", "b"]);
    }

    #[test]
    fn smaller_constant_favors_top_ranks() {
        let vector = vec![hit("a", 0.9, SourceKind::Vector), hit("b", 0.8, SourceKind::Vector)];
        let lexical = vec![hit("b", 3.0, SourceKind::Lexical), hit("c", 1.0, SourceKind::Lexical)];
        let sharp = reciprocal_rank_fusion(&[vector.clone(), lexical.clone()], 1.0, 5);
        let flat = reciprocal_rank_fusion(&[vector, lexical], 60.0, 5);
        let gap = |f: &[RetrievalHit]| f[0].score - f[f.len() - 1].score;
        assert!(gap(&sharp) > gap(&flat));
    }
}

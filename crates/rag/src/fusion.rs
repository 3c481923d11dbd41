//! Reciprocal Rank Fusion
//!
//! The dispatcher hands over one flat list in which each retrieval call
//! contributed up to `rank_period` chunks back to back. The rank of a chunk
//! is taken from its position alone, `rank = (idx % rank_period) + 1`,
//! rather than from call boundaries. A call that returns fewer than
//! `rank_period` chunks shifts the inferred ranks of everything after it.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use docqa_core::Chunk;

/// Identity used to merge the same chunk across calls
///
/// Chunks without an identifier fall back to a hash of the raw content, so
/// texts differing only in whitespace stay separate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    ChunkId(String),
    ContentHash(u64),
}

impl DedupKey {
    pub fn of(chunk: &Chunk) -> Self {
        match chunk.chunk_id {
            Some(ref id) => DedupKey::ChunkId(id.clone()),
            None => {
                let mut hasher = DefaultHasher::new();
                chunk.content.hash(&mut hasher);
                DedupKey::ContentHash(hasher.finish())
            },
        }
    }
}

/// Chunk with its accumulated fusion score
#[derive(Debug, Clone, PartialEq)]
pub struct FusedChunk {
    pub chunk: Chunk,
    pub score: f64,
}

/// Fuse the flat candidate list into a deduplicated ranking
///
/// Every occurrence adds `1 / (rrf_k + rank)` to its key. The first
/// occurrence of a key is the chunk kept. Output is sorted by descending
/// score with ties in first-seen order, and truncated to `top_n`.
pub fn rrf_fusion(
    candidates: &[Chunk],
    rrf_k: u32,
    rank_period: usize,
    top_n: usize,
) -> Vec<FusedChunk> {
    let rank_period = rank_period.max(1);
    let mut positions: HashMap<DedupKey, usize> = HashMap::new();
    let mut fused: Vec<FusedChunk> = Vec::new();

    for (idx, chunk) in candidates.iter().enumerate() {
        let rank = (idx % rank_period) + 1;
        let contribution = 1.0 / (f64::from(rrf_k) + rank as f64);

        let slot = *positions.entry(DedupKey::of(chunk)).or_insert_with(|| {
            fused.push(FusedChunk {
                chunk: chunk.clone(),
                score: 0.0,
            });
            fused.len() - 1
        });
        fused[slot].score += contribution;
    }

    // sort_by is stable: equal scores keep first-seen order
    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    fused.truncate(top_n);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    const K: u32 = 60;
    const PERIOD: usize = 5;
    const CAP: usize = 15;

    fn chunk(id: &str) -> Chunk {
        Chunk::new(format!("text of {}", id)).with_chunk_id(id)
    }

    fn ids(fused: &[FusedChunk]) -> Vec<&str> {
        fused.iter().map(|f| f.chunk.source_label()).collect()
    }

    fn rrf(rank: usize) -> f64 {
        1.0 / (K as f64 + rank as f64)
    }

    #[test]
    fn test_agreement_across_all_calls_wins() {
        // 8 calls of 5 results; "common" sits at rank 5 in every call, the
        // singletons hold rank 1..4 in their own call only
        let mut candidates = Vec::new();
        for call in 0..8 {
            for slot in 0..4 {
                candidates.push(chunk(&format!("c{}-{}", call, slot)));
            }
            candidates.push(chunk("common"));
        }

        let fused = rrf_fusion(&candidates, K, PERIOD, CAP);
        assert_eq!(fused[0].chunk.source_label(), "common");
        assert!((fused[0].score - 8.0 * rrf(5)).abs() < 1e-12);
        assert!(fused[0].score > fused[1].score);
    }

    #[test]
    fn test_same_chunk_id_merges_with_summed_score() {
        let candidates = vec![chunk("a"), chunk("b"), chunk("a")];
        let fused = rrf_fusion(&candidates, K, PERIOD, CAP);

        assert_eq!(fused.len(), 2);
        assert_eq!(ids(&fused), vec!["a", "b"]);
        assert!((fused[0].score - (rrf(1) + rrf(3))).abs() < 1e-12);
    }

    #[test]
    fn test_rank_is_position_modulo_period() {
        let candidates: Vec<Chunk> = (0..7).map(|i| chunk(&format!("c{}", i))).collect();
        let fused = rrf_fusion(&candidates, K, PERIOD, CAP);

        let score_of = |id: &str| {
            fused
                .iter()
                .find(|f| f.chunk.source_label() == id)
                .unwrap()
                .score
        };
        assert_eq!(score_of("c0"), rrf(1));
        assert_eq!(score_of("c4"), rrf(5));
        assert_eq!(score_of("c5"), rrf(1));
        assert_eq!(score_of("c6"), rrf(2));
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let candidates = vec![
            chunk("x"),
            chunk("y"),
            chunk("z"),
            chunk("w"),
            chunk("v"),
            chunk("y2"),
        ];
        let fused = rrf_fusion(&candidates, K, PERIOD, CAP);
        // x and y2 both rank 1
        assert_eq!(ids(&fused)[..2], ["x", "y2"]);
    }

    #[test]
    fn test_content_hash_fallback() {
        let candidates = vec![
            Chunk::new("same text"),
            Chunk::new("same text"),
            Chunk::new("same  text"),
        ];
        let fused = rrf_fusion(&candidates, K, PERIOD, CAP);

        assert_eq!(fused.len(), 2);
        assert!((fused[0].score - (rrf(1) + rrf(2))).abs() < 1e-12);
        assert_eq!(fused[1].chunk.content, "same  text");
    }

    #[test]
    fn test_output_is_capped() {
        let candidates: Vec<Chunk> = (0..40).map(|i| chunk(&format!("c{}", i))).collect();
        let fused = rrf_fusion(&candidates, K, PERIOD, CAP);
        assert_eq!(fused.len(), CAP);
        assert!(fused.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_chunk_found_by_both_backends() {
        let target = Chunk::identified("The model achieves 92% accuracy.", "paper.pdf", 2, 7);
        let mut candidates = vec![target.clone(), chunk("d1"), chunk("d2"), chunk("d3"), chunk("d4")];
        candidates.extend(vec![target.clone(), chunk("l1"), chunk("l2")]);

        let fused = rrf_fusion(&candidates, K, PERIOD, CAP);
        assert_eq!(fused[0].chunk.source_label(), "paper.pdf, page 2, chunk 7");
        assert!(fused[0].score >= 2.0 * rrf(1) - 1e-12);
    }

    #[test]
    fn test_empty_input() {
        assert!(rrf_fusion(&[], K, PERIOD, CAP).is_empty());
    }
}

use crate::config::Weighting;
use crate::index::{idf, log_tf, DocId, InvertedIndex, TermId};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// One ranked hit. Higher score is more similar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredResult {
    pub ticket_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct Scorer {
    weighting: Weighting,
}

impl Scorer {
    pub fn new(weighting: Weighting) -> Self { Self { weighting } }

    /// Score every ticket sharing at least one token with the query. Tickets
    /// with no overlap are absent from the map, not zero.
    pub fn score(&self, query_tokens: &[String], index: &InvertedIndex) -> HashMap<DocId, f32> {
        // ordered by term id so every call sums contributions in the same order
        let mut tf_q_raw: BTreeMap<TermId, u32> = BTreeMap::new();
        for term in query_tokens {
            if let Some(tid) = index.term_id(term) {
                *tf_q_raw.entry(tid).or_insert(0) += 1;
            }
        }
        let mut scores: HashMap<DocId, f32> = HashMap::new();
        if tf_q_raw.is_empty() { return scores; }

        let n = index.num_docs();
        match self.weighting {
            Weighting::TfIdf => {
                let mut q_weights: Vec<(TermId, f32)> = tf_q_raw
                    .iter()
                    .map(|(&tid, &tf)| (tid, log_tf(tf as f32) * idf(n, index.df(tid))))
                    .collect();
                let mut norm = q_weights.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
                if norm == 0.0 { norm = 1.0; }
                for (_, w) in q_weights.iter_mut() { *w /= norm; }

                for (tid, q_w) in q_weights {
                    let w_idf = idf(n, index.df(tid));
                    for p in index.postings(tid) {
                        let d_w = log_tf(p.tf) * w_idf / index.doc_norm(p.doc_id);
                        *scores.entry(p.doc_id).or_insert(0.0) += d_w * q_w;
                    }
                }
            }
            Weighting::Bm25 { k1, b } => {
                let avg = index.avg_doc_length().max(f32::EPSILON);
                for (&tid, &q_tf) in tf_q_raw.iter() {
                    let w_idf = idf(n, index.df(tid));
                    for p in index.postings(tid) {
                        let len_norm = 1.0 - b + b * index.doc_length(p.doc_id) / avg;
                        let sat = p.tf * (k1 + 1.0) / (p.tf + k1 * len_norm);
                        *scores.entry(p.doc_id).or_insert(0.0) += w_idf * sat * q_tf as f32;
                    }
                }
            }
        }
        scores
    }
}

/// Score descending, then doc id (= ticket id) ascending.
fn rank_order(a: &(DocId, f32), b: &(DocId, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

/// Top-k selection over a score map.
pub fn rank(scores: HashMap<DocId, f32>, k: usize, index: &InvertedIndex) -> Vec<ScoredResult> {
    if k == 0 { return Vec::new(); }
    let mut scored: Vec<(DocId, f32)> = scores.into_iter().map(|(d, s)| (d, s.max(0.0))).collect();
    if scored.len() > k {
        scored.select_nth_unstable_by(k - 1, rank_order);
        scored.truncate(k);
    }
    scored.sort_by(rank_order);
    scored
        .into_iter()
        .map(|(doc_id, score)| ScoredResult { ticket_id: index.doc(doc_id).ticket_id.clone(), score })
        .collect()
}

use crate::config::IndexConfig;
use crate::corpus::{Corpus, SkippedRecord, Ticket};
use crate::error::IngestError;
use crate::tokenizer::Normalizer;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

pub type TermId = u32;
pub type DocId = u32;

/// Floor applied to IDF so no matching term ever contributes zero or less.
pub const IDF_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Posting {
    pub doc_id: DocId,
    /// Weighted term frequency (solution occurrences count for less).
    pub tf: f32,
}

/// Borrowed view of one token's postings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvertedIndexEntry<'a> {
    pub token: &'a str,
    pub postings: &'a [Posting], // sorted by doc_id, i.e. by ticket id
    pub document_frequency: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildReport {
    pub indexed: usize,
    pub skipped: Vec<SkippedRecord>,
}

pub struct BuildOutput {
    pub index: InvertedIndex,
    pub report: BuildReport,
}

/// Immutable inverted index. Documents are numbered in ascending ticket-id order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvertedIndex {
    dictionary: HashMap<String, TermId>,
    terms: Vec<String>,
    df: Vec<u32>,
    postings: Vec<Vec<Posting>>, // indexed by TermId
    docs: Vec<Arc<Ticket>>,      // indexed by DocId
    doc_lengths: Vec<f32>,
    doc_norms: Vec<f32>,
    avg_doc_length: f32,
    normalizer: Normalizer,
}

/// `max(ln((n + 1) / (df + 1)) + 1, IDF_EPSILON)`
pub fn idf(num_docs: u32, df: u32) -> f32 {
    let v = ((num_docs as f32 + 1.0) / (df as f32 + 1.0)).ln() + 1.0;
    v.max(IDF_EPSILON)
}

/// Log-scaled term frequency.
pub fn log_tf(tf: f32) -> f32 {
    if tf > 0.0 { 1.0 + tf.ln().max(-0.99) } else { 0.0 }
}

impl InvertedIndex {
    /// Corpus ids are unique (`Corpus::insert` rejects duplicates), so build only
    /// skips tickets that yield no terms.
    pub fn build(corpus: &Corpus, config: &IndexConfig) -> BuildOutput {
        let normalizer = Normalizer::new(config.stemming);
        let mut ordered: Vec<&Arc<Ticket>> = corpus.tickets().iter().collect();
        ordered.sort_by(|a, b| a.ticket_id.cmp(&b.ticket_id));

        let mut index = InvertedIndex { normalizer, ..Default::default() };
        let mut report = BuildReport::default();
        let mut raw: Vec<Vec<(DocId, f32)>> = Vec::new();

        for (position, ticket) in ordered.into_iter().enumerate() {
            let mut tf_counts: HashMap<String, f32> = HashMap::new();
            for term in normalizer.normalize(&ticket.problem_description) {
                *tf_counts.entry(term).or_insert(0.0) += 1.0;
            }
            if config.solution_weight > 0.0 {
                for term in normalizer.normalize(&ticket.solution_text) {
                    *tf_counts.entry(term).or_insert(0.0) += config.solution_weight;
                }
            }
            if tf_counts.is_empty() {
                tracing::warn!(ticket_id = %ticket.ticket_id, "ticket has no indexable terms, skipping");
                report.skipped.push(SkippedRecord { position, reason: IngestError::NoTerms(ticket.ticket_id.clone()).to_string() });
                continue;
            }

            let doc_id = index.docs.len() as DocId;
            index.docs.push(Arc::clone(ticket));
            // deterministic term-id assignment and length sum regardless of HashMap order
            let mut terms: Vec<(String, f32)> = tf_counts.into_iter().collect();
            terms.sort_by(|a, b| a.0.cmp(&b.0));
            index.doc_lengths.push(terms.iter().map(|(_, tf)| tf).sum());
            for (term, tf) in terms {
                let tid = match index.dictionary.get(&term) {
                    Some(&tid) => tid,
                    None => {
                        let tid = index.terms.len() as TermId;
                        index.dictionary.insert(term.clone(), tid);
                        index.terms.push(term);
                        index.df.push(0);
                        raw.push(Vec::new());
                        tid
                    }
                };
                index.df[tid as usize] += 1;
                raw[tid as usize].push((doc_id, tf));
            }
        }

        let n = index.docs.len() as u32;
        index.avg_doc_length = if n == 0 { 0.0 } else { index.doc_lengths.iter().sum::<f32>() / n as f32 };
        index.doc_norms = vec![0.0; n as usize];
        for (tid, plist) in raw.iter().enumerate() {
            let w_idf = idf(n, index.df[tid]);
            for &(doc_id, tf) in plist {
                let w = log_tf(tf) * w_idf;
                index.doc_norms[doc_id as usize] += w * w;
            }
        }
        for dn in index.doc_norms.iter_mut() {
            *dn = dn.sqrt();
            if *dn == 0.0 { *dn = 1.0; }
        }
        // doc ids were handed out in ascending order, so every list is already sorted
        index.postings = raw
            .into_iter()
            .map(|plist| plist.into_iter().map(|(doc_id, tf)| Posting { doc_id, tf }).collect())
            .collect();

        report.indexed = n as usize;
        tracing::info!(num_docs = n, num_terms = index.terms.len(), skipped = report.skipped.len(), "index built");
        BuildOutput { index, report }
    }

    pub fn num_docs(&self) -> u32 { self.docs.len() as u32 }

    pub fn num_terms(&self) -> usize { self.terms.len() }

    pub fn normalizer(&self) -> &Normalizer { &self.normalizer }

    pub fn term_id(&self, token: &str) -> Option<TermId> { self.dictionary.get(token).copied() }

    pub fn term(&self, tid: TermId) -> &str { &self.terms[tid as usize] }

    pub fn df(&self, tid: TermId) -> u32 { self.df[tid as usize] }

    pub fn postings(&self, tid: TermId) -> &[Posting] { &self.postings[tid as usize] }

    pub fn entry(&self, token: &str) -> Option<InvertedIndexEntry<'_>> {
        let tid = self.term_id(token)?;
        Some(InvertedIndexEntry { token: self.term(tid), postings: self.postings(tid), document_frequency: self.df(tid) })
    }

    pub fn entries(&self) -> impl Iterator<Item = InvertedIndexEntry<'_>> {
        (0..self.terms.len() as TermId).map(move |tid| InvertedIndexEntry {
            token: self.term(tid),
            postings: self.postings(tid),
            document_frequency: self.df(tid),
        })
    }

    pub fn doc(&self, doc_id: DocId) -> &Arc<Ticket> { &self.docs[doc_id as usize] }

    pub fn doc_length(&self, doc_id: DocId) -> f32 { self.doc_lengths[doc_id as usize] }

    pub fn doc_norm(&self, doc_id: DocId) -> f32 { self.doc_norms[doc_id as usize] }

    pub fn avg_doc_length(&self) -> f32 { self.avg_doc_length }
}

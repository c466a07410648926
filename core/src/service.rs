use crate::config::SearchConfig;
use crate::corpus::{Corpus, LoadReport, Ticket, TicketRecord};
use crate::error::SearchError;
use crate::index::{BuildReport, InvertedIndex};
use crate::scorer::{rank, ScoredResult, Scorer};
use crate::tokenizer::raw_word_count;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A corpus together with the index derived from it. Never mutated once built.
#[derive(Debug)]
pub struct IndexSnapshot {
    pub generation: u64,
    pub corpus: Corpus,
    pub index: InvertedIndex,
}

/// Query text plus an optional sequence number for staleness checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    #[serde(default)]
    pub seq: Option<u64>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self { Self { text: text.into(), seq: None } }

    /// Accepts a JSON string or `{ "text": ..., "seq": ... }`; anything else is malformed.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, SearchError> {
        match value {
            serde_json::Value::String(s) => Ok(Query::new(s.clone())),
            serde_json::Value::Object(_) => serde_json::from_value(value.clone())
                .map_err(|e| SearchError::InvalidQuery(e.to_string())),
            other => Err(SearchError::InvalidQuery(format!("expected text, got {}", json_kind(other)))),
        }
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Terminal state of a single query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Too few tokens after normalization; the scorer was not invoked.
    Empty,
    Ready(Vec<ScoredResult>),
}

impl QueryOutcome {
    pub fn into_results(self) -> Vec<ScoredResult> {
        match self {
            QueryOutcome::Empty => Vec::new(),
            QueryOutcome::Ready(results) => results,
        }
    }
}

/// A ranked ticket with the fields the suggestion UI renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarIssue {
    pub ticket_id: String,
    pub problem_description: String,
    pub solution_text: String,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub similarity_score: f32,
}

impl SimilarIssue {
    fn from_ticket(ticket: &Ticket, score: f32) -> Self {
        Self {
            ticket_id: ticket.ticket_id.clone(),
            problem_description: ticket.problem_description.clone(),
            solution_text: ticket.solution_text.clone(),
            category: ticket.category.clone(),
            priority: ticket.priority.clone(),
            similarity_score: score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveResults {
    pub seq: u64,
    pub issues: Vec<SimilarIssue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub load: LoadReport,
    pub build: BuildReport,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    pub tickets: usize,
    pub indexed: u32,
    pub terms: usize,
    pub generation: u64,
}

/// Similar-ticket query service: single writer, many readers, whole-snapshot swaps.
pub struct SimilarityService {
    config: SearchConfig,
    scorer: Scorer,
    current: RwLock<Option<Arc<IndexSnapshot>>>,
    writer: Mutex<()>,
    next_seq: AtomicU64,
}

impl SimilarityService {
    pub fn new(config: SearchConfig) -> Self {
        let scorer = Scorer::new(config.weighting);
        Self { config, scorer, current: RwLock::new(None), writer: Mutex::new(()), next_seq: AtomicU64::new(1) }
    }

    pub fn with_tickets<I: IntoIterator<Item = Ticket>>(config: SearchConfig, tickets: I) -> Self {
        let svc = Self::new(config);
        svc.ingest(tickets.into_iter().map(TicketRecord::from));
        svc
    }

    pub fn config(&self) -> &SearchConfig { &self.config }

    /// Current snapshot; the read lock is held only long enough to clone the Arc.
    pub fn snapshot(&self) -> Result<Arc<IndexSnapshot>, SearchError> {
        self.current.read().clone().ok_or(SearchError::NotReady)
    }

    pub fn is_ready(&self) -> bool { self.current.read().is_some() }

    /// Append records to the corpus, rebuild the index and swap both in.
    /// Nothing is published when no record was accepted and an index already exists.
    pub fn ingest<I>(&self, records: I) -> IngestReport
    where
        I: IntoIterator<Item = TicketRecord>,
    {
        let _writer = self.writer.lock();
        let previous = self.current.read().clone();
        let mut corpus = previous.as_ref().map(|s| s.corpus.clone()).unwrap_or_default();
        let load = corpus.bulk_load(records);
        let generation = previous.as_ref().map(|s| s.generation).unwrap_or(0);

        if load.inserted == 0 && previous.is_some() {
            tracing::info!(skipped = load.skip_count(), "ingest accepted no records, keeping current index");
            return IngestReport { load, build: BuildReport::default(), generation };
        }
        if corpus.is_empty() {
            tracing::warn!(skipped = load.skip_count(), "ingest left the corpus empty, index not built");
            return IngestReport { load, build: BuildReport::default(), generation };
        }

        let out = InvertedIndex::build(&corpus, &self.config.index);
        let snapshot = Arc::new(IndexSnapshot { generation: generation + 1, corpus, index: out.index });
        *self.current.write() = Some(snapshot);
        tracing::info!(
            inserted = load.inserted,
            skipped = load.skip_count() + out.report.skipped.len(),
            generation = generation + 1,
            "corpus ingested and index swapped"
        );
        IngestReport { load, build: out.report, generation: generation + 1 }
    }

    pub fn search(&self, text: &str, k: usize) -> Result<Vec<ScoredResult>, SearchError> {
        Ok(self.query(text, k)?.into_results())
    }

    pub fn query(&self, text: &str, k: usize) -> Result<QueryOutcome, SearchError> {
        let snapshot = self.snapshot()?;
        self.query_snapshot(&snapshot, text, k)
    }

    /// Run a query against a specific snapshot, regardless of later rebuilds.
    pub fn query_snapshot(&self, snapshot: &IndexSnapshot, text: &str, k: usize) -> Result<QueryOutcome, SearchError> {
        self.check_text(text)?;
        tracing::trace!(state = "tokenizing", generation = snapshot.generation);
        let tokens = snapshot.index.normalizer().normalize(text);
        if tokens.len() < self.config.min_query_tokens {
            tracing::debug!(tokens = tokens.len(), min = self.config.min_query_tokens, "query below token minimum");
            return Ok(QueryOutcome::Empty);
        }
        tracing::trace!(state = "scoring", tokens = tokens.len());
        let scores = self.scorer.score(&tokens, &snapshot.index);
        let candidates = scores.len();
        let results = rank(scores, k, &snapshot.index);
        tracing::debug!(candidates, returned = results.len(), "query ready");
        Ok(QueryOutcome::Ready(results))
    }

    pub fn similar_issues(&self, text: &str, k: usize) -> Result<Vec<SimilarIssue>, SearchError> {
        let snapshot = self.snapshot()?;
        let results = self.query_snapshot(&snapshot, text, k)?.into_results();
        Ok(join(&snapshot, results))
    }

    /// As-you-type search: numbered, gated on raw word count, capped at `live_k`.
    pub fn live_search(&self, text: &str) -> Result<LiveResults, SearchError> {
        let seq = self.next_seq();
        self.live_search_seq(seq, text)
    }

    pub fn next_seq(&self) -> u64 { self.next_seq.fetch_add(1, Ordering::Relaxed) }

    pub(crate) fn live_search_seq(&self, seq: u64, text: &str) -> Result<LiveResults, SearchError> {
        let snapshot = self.snapshot()?;
        self.check_text(text)?;
        if raw_word_count(text) < self.config.live_min_words {
            return Ok(LiveResults { seq, issues: Vec::new() });
        }
        let results = self.query_snapshot(&snapshot, text, self.config.live_k)?.into_results();
        Ok(LiveResults { seq, issues: join(&snapshot, results) })
    }

    pub fn ticket(&self, ticket_id: &str) -> Option<Arc<Ticket>> {
        let snapshot = self.current.read().clone()?;
        snapshot.corpus.get(ticket_id).cloned()
    }

    pub fn stats(&self) -> ServiceStats {
        match self.current.read().clone() {
            Some(s) => ServiceStats {
                tickets: s.corpus.len(),
                indexed: s.index.num_docs(),
                terms: s.index.num_terms(),
                generation: s.generation,
            },
            None => ServiceStats { tickets: 0, indexed: 0, terms: 0, generation: 0 },
        }
    }

    fn check_text(&self, text: &str) -> Result<(), SearchError> {
        if text.contains('\0') {
            return Err(SearchError::InvalidQuery("query contains NUL bytes".into()));
        }
        let len = text.chars().count();
        if len > self.config.max_query_chars {
            return Err(SearchError::InvalidQuery(format!("query is {len} chars, limit is {}", self.config.max_query_chars)));
        }
        Ok(())
    }
}

fn join(snapshot: &IndexSnapshot, results: Vec<ScoredResult>) -> Vec<SimilarIssue> {
    results
        .into_iter()
        .filter_map(|r| snapshot.corpus.get(&r.ticket_id).map(|t| SimilarIssue::from_ticket(t, r.score)))
        .collect()
}

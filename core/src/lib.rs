pub mod analysis;
pub mod config;
pub mod corpus;
pub mod error;
pub mod feedback;
pub mod index;
pub mod kb;
pub mod live;
pub mod scorer;
pub mod service;
pub mod tokenizer;

pub use config::{IndexConfig, SearchConfig, Weighting};
pub use corpus::{Corpus, LoadReport, Ticket, TicketRecord};
pub use error::{IngestError, KbError, SearchError};
pub use feedback::{Feedback, FeedbackCounts, FeedbackLedger, FeedbackOutcome};
pub use index::{DocId, InvertedIndex, InvertedIndexEntry, Posting, TermId};
pub use scorer::{ScoredResult, Scorer};
pub use service::{IndexSnapshot, LiveResults, Query, QueryOutcome, SimilarIssue, SimilarityService};

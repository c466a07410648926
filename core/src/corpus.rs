use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A solved ticket. Never mutated after insertion; corrections get a new id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub problem_description: String,
    pub solution_text: String,
    pub category: Option<String>,
    pub priority: Option<String>,
}

impl Ticket {
    pub fn new(id: impl Into<String>, description: impl Into<String>, solution: impl Into<String>) -> Self {
        Self {
            ticket_id: id.into(),
            problem_description: description.into(),
            solution_text: solution.into(),
            category: None,
            priority: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }
}

/// Unvalidated knowledge-base row. `ticket_no` is accepted as an alias for the id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketRecord {
    #[serde(default, alias = "ticket_no", alias = "id")]
    pub ticket_id: Option<String>,
    #[serde(default)]
    pub problem_description: Option<String>,
    #[serde(default)]
    pub solution_text: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

impl From<Ticket> for TicketRecord {
    fn from(t: Ticket) -> Self {
        Self {
            ticket_id: Some(t.ticket_id),
            problem_description: Some(t.problem_description),
            solution_text: Some(t.solution_text),
            category: t.category,
            priority: t.priority,
        }
    }
}

impl TicketRecord {
    pub fn validate(self) -> Result<Ticket, IngestError> {
        let ticket_id = self.ticket_id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).ok_or(IngestError::MissingId)?;
        let problem_description = match self.problem_description {
            Some(d) if !d.trim().is_empty() => d,
            _ => return Err(IngestError::EmptyDescription(ticket_id)),
        };
        Ok(Ticket {
            ticket_id,
            problem_description,
            solution_text: self.solution_text.unwrap_or_default(),
            category: non_blank(self.category),
            priority: non_blank(self.priority),
        })
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// A record that was rejected, with its position in the input batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub position: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub inserted: usize,
    pub skipped: Vec<SkippedRecord>,
}

impl LoadReport {
    pub fn skip_count(&self) -> usize { self.skipped.len() }
}

/// Append-only ticket store. Cloning is cheap (tickets are shared).
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    tickets: Vec<Arc<Ticket>>,
    by_id: HashMap<String, usize>,
}

impl Corpus {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.tickets.len() }

    pub fn is_empty(&self) -> bool { self.tickets.is_empty() }

    pub fn get(&self, ticket_id: &str) -> Option<&Arc<Ticket>> {
        self.by_id.get(ticket_id).map(|&i| &self.tickets[i])
    }

    pub fn contains(&self, ticket_id: &str) -> bool { self.by_id.contains_key(ticket_id) }

    pub fn tickets(&self) -> &[Arc<Ticket>] { &self.tickets }

    pub fn insert(&mut self, ticket: Ticket) -> Result<(), IngestError> {
        if self.by_id.contains_key(&ticket.ticket_id) {
            return Err(IngestError::DuplicateId(ticket.ticket_id));
        }
        self.by_id.insert(ticket.ticket_id.clone(), self.tickets.len());
        self.tickets.push(Arc::new(ticket));
        Ok(())
    }

    /// Validate and insert every record; bad records are reported and skipped.
    pub fn bulk_load<I>(&mut self, records: I) -> LoadReport
    where
        I: IntoIterator<Item = TicketRecord>,
    {
        let mut report = LoadReport::default();
        for (position, record) in records.into_iter().enumerate() {
            match record.validate().and_then(|t| self.insert(t)) {
                Ok(()) => report.inserted += 1,
                Err(e) => {
                    tracing::warn!(position, error = %e, "skipping knowledge-base record");
                    report.skipped.push(SkippedRecord { position, reason: e.to_string() });
                }
            }
        }
        report
    }
}

impl FromIterator<Ticket> for Corpus {
    fn from_iter<T: IntoIterator<Item = Ticket>>(iter: T) -> Self {
        let mut corpus = Corpus::new();
        corpus.bulk_load(iter.into_iter().map(TicketRecord::from));
        corpus
    }
}

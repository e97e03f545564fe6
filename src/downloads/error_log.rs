//! Bounded log of recent request failures.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::api::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ApiError,
    SentryTest,
    NetworkError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiError => "api_error",
            Self::SentryTest => "sentry_test",
            Self::NetworkError => "network_error",
        }
    }
}

impl From<&ApiError> for ErrorKind {
    fn from(err: &ApiError) -> Self {
        if err.is_http() {
            Self::ApiError
        } else {
            Self::NetworkError
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEntry {
    pub id: Uuid,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub trace_id: Option<String>,
    pub kind: ErrorKind,
    pub status: Option<u16>,
}

impl ErrorEntry {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.into(),
            timestamp: Utc::now(),
            trace_id: None,
            kind,
            status: None,
        }
    }

    pub fn with_trace_id(mut self, trace_id: Option<String>) -> Self {
        self.trace_id = trace_id;
        self
    }

    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }
}

/// Upper bound on retained entries, whatever the configured capacity.
pub const MAX_ERROR_LOG_ENTRIES: usize = 10;

/// Newest-first log holding at most `capacity` entries.
#[derive(Debug)]
pub struct ErrorLog {
    entries: VecDeque<ErrorEntry>,
    capacity: usize,
}

impl ErrorLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_ERROR_LOG_ENTRIES);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: ErrorEntry) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

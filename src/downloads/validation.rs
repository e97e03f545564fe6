//! File identifier validation.

use serde::Deserialize;
use serde_json::Value;

use crate::config::DownloadConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("File ID must be between {} and {}", group_thousands(.min), group_thousands(.max))]
pub struct FileIdError {
    pub min: u64,
    pub max: u64,
}

/// Inclusive range of accepted file identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdRange {
    pub min: u64,
    pub max: u64,
}

impl FileIdRange {
    pub fn from_config(config: &DownloadConfig) -> Self {
        Self {
            min: config.min_file_id,
            max: config.max_file_id,
        }
    }

    /// Parse user input as an integer inside the range.
    pub fn validate(&self, raw: &str) -> Result<u64, FileIdError> {
        raw.trim()
            .parse::<u64>()
            .ok()
            .filter(|id| (self.min..=self.max).contains(id))
            .ok_or(FileIdError {
                min: self.min,
                max: self.max,
            })
    }
}

impl Default for FileIdRange {
    fn default() -> Self {
        Self::from_config(&DownloadConfig::default())
    }
}

/// File identifier exactly as a client submitted it.
///
/// Any JSON value is accepted so that floats, `null` or a missing field reach
/// `FileIdRange::validate` and get its message instead of a decode rejection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct FileIdInput(pub Value);

impl FileIdInput {
    /// Text handed to `FileIdRange::validate`; non-scalar values become empty.
    pub fn as_raw(&self) -> String {
        match &self.0 {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            _ => String::new(),
        }
    }
}

fn group_thousands(n: &u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

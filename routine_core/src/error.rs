//! Error types for the routine_core library.

use std::fmt;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for routine_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog validation error
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// Malformed or structurally inconsistent request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A referenced exercise, stretch, image set or matrix cell is absent
    #[error("Incomplete catalog data: {0}")]
    IncompleteCatalog(String),

    /// Time allocation would produce a nonpositive duration
    #[error("Allocation error: {0}")]
    Allocation(String),

    /// One or more concurrent catalog fetches failed
    #[error("Catalog fetch failed: {0}")]
    Fetch(FetchFailures),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the caller sent something unusable, as opposed to a
    /// server-side data or service failure.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Error::InvalidRequest(_) | Error::Json(_))
    }
}

/// Every error collected from a fan-out fetch, in task order.
#[derive(Debug)]
pub struct FetchFailures(pub Vec<Error>);

impl FetchFailures {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.0.iter()
    }
}

impl fmt::Display for FetchFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s)", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            write!(f, "{} {}", if i == 0 { ":" } else { ";" }, err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_failures_lists_every_cause() {
        let err = Error::Fetch(FetchFailures(vec![
            Error::Other("exercise down".into()),
            Error::Other("transition down".into()),
        ]));

        let msg = err.to_string();
        assert!(msg.contains("2 error(s)"));
        assert!(msg.contains("exercise down"));
        assert!(msg.contains("transition down"));
        assert!(!err.is_bad_request());
    }

    #[test]
    fn test_bad_request_classification() {
        assert!(Error::InvalidRequest("no ids".into()).is_bad_request());
        assert!(!Error::IncompleteCatalog("missing squat".into()).is_bad_request());
        assert!(!Error::Allocation("negative".into()).is_bad_request());
    }
}

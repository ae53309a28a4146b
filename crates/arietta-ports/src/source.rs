use serde::{Deserialize, Serialize};

/// Fallback chain for a recording's encoded event stream. The engine tries
/// `Primary` first and falls through to `Secondary` before giving up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceVariant {
    Primary,
    Secondary,
}

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("no source for slug: {0}")]
    NotFound(String),
    #[error("fetch failed: {0}")]
    Network(String),
}

pub trait SourcePort: Send {
    fn fetch(&self, slug: &str, variant: SourceVariant) -> Result<Vec<u8>, SourceError>;

    /// The optional analysis report for a recording; `Ok(None)` when the
    /// recording simply has none.
    fn fetch_analysis(&self, slug: &str) -> Result<Option<Vec<u8>>, SourceError>;
}

//! Error taxonomy for the search and rendering pipeline.
//!
//! | Error | Raised by | Surfaced as |
//! |-------|-----------|-------------|
//! | [`QueryError`] | query normalization | `400 Bad input: ...` before streaming |
//! | [`SearchError`] | a [`MatchSource`](crate::source::MatchSource) stream | inline notice after partial results |
//! | [`SinkError`] | a [`FragmentSink`](crate::render::FragmentSink) | logged; the render loop stops |
//!
//! A metadata miss is not an error: renderers degrade (empty header fields)
//! or skip the summary row.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// The request could not be turned into a [`Query`](crate::query::Query).
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("search must be 'junit', 'build-log', or 'all'")]
    SearchType(String),

    #[error("name is an invalid regular expression: {0}")]
    JobFilter(#[from] regex::Error),

    #[error("maxAge is an invalid duration: {0}")]
    MaxAge(String),

    #[error("maxAge must be non-negative")]
    NegativeMaxAge,

    #[error("context must be a number between -1 and 15")]
    Context(String),
}

/// The match backend failed or ran out of time.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search did not complete within {0:?}")]
    Timeout(Duration),

    #[error("search backend I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("search worker failed: {0}")]
    Worker(String),
}

/// Writing to the response transport failed.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("client disconnected")]
    Closed,

    #[error("write failed: {0}")]
    Io(#[from] io::Error),
}

/// Terminal error of a single render call.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl RenderError {
    /// True when the client is gone and nothing more should be written.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, RenderError::Sink(_))
    }
}

//! Core data models shared by the search backend and the renderers.
//!
//! These types represent the match events that flow from a
//! [`MatchSource`](crate::source::MatchSource) into the renderers, and the
//! per-source metadata used to label each rendered block.

use chrono::{DateTime, Utc};
use url::Url;

/// Which class of artifact a search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchType {
    /// JUnit test-result files.
    Junit,
    /// Build logs.
    BuildLog,
    /// Both of the above.
    #[default]
    All,
}

impl SearchType {
    pub const ALL: [SearchType; 3] = [SearchType::Junit, SearchType::BuildLog, SearchType::All];

    /// The form value for this type (`junit`, `build-log`, `all`).
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Junit => "junit",
            SearchType::BuildLog => "build-log",
            SearchType::All => "all",
        }
    }

    /// Whether artifacts of `kind` (a `junit` or `build-log` directory) qualify.
    pub fn includes(&self, kind: SearchType) -> bool {
        *self == SearchType::All || *self == kind
    }
}

/// One hit reported by the search backend.
///
/// Events for the same artifact arrive consecutively; the renderers rely on
/// that to group hits into blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEvent {
    /// Opaque identifier of the originating artifact.
    pub source_id: String,
    /// The query pattern that matched.
    pub pattern: String,
    /// Matched line plus surrounding context, in file order.
    pub lines: Vec<String>,
    /// Lines of this hit the backend left out.
    pub elided_lines: usize,
}

/// Descriptive metadata for one artifact, resolved once per block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedMetadata {
    /// Human file-type label (e.g. `junit`, `build log`).
    pub file_type: String,
    /// What started the job (`pull`, `periodic`, `build`).
    pub trigger: String,
    /// Job name.
    pub name: String,
    /// Build number within the job.
    pub number: u64,
    /// Link to the job run, when known.
    pub job_url: Option<Url>,
    /// When the run failed; `None` when the age is unknown.
    pub failed_at: Option<DateTime<Utc>>,
}

/// Aggregate size of the searchable corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorpusStats {
    /// Total bytes across all indexed artifacts.
    pub size: u64,
    /// Number of indexed artifacts.
    pub entries: u64,
}

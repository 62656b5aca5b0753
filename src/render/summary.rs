//! Summary view: one table row per source with the number of hits it had.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::format::{age_since, escape_html};
use super::BlockRenderer;
use crate::models::{MatchEvent, ResolvedMetadata};

/// Renders a hit-count table.
///
/// A row needs a link target, so a source whose metadata has no job URL is
/// skipped: no row is written and it does not count as a match.
pub struct SummaryRenderer {
    start: DateTime<Utc>,
    current_hits: usize,
}

impl SummaryRenderer {
    /// `start` is the moment the search began; ages are measured from it.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            current_hits: 0,
        }
    }
}

impl BlockRenderer for SummaryRenderer {
    fn begin(&mut self, out: &mut String) {
        out.push_str(
            r#"<table class="table table-responsive"><tbody><tr><th>Type</th><th>Job</th><th>Age</th><th># of hits</th></tr>"#,
        );
    }

    fn open_block(
        &mut self,
        out: &mut String,
        source_id: &str,
        metadata: Option<&ResolvedMetadata>,
    ) -> bool {
        let Some((meta, url)) = metadata.and_then(|m| m.job_url.as_ref().map(|u| (m, u))) else {
            warn!("no job URL for {:?}", source_id);
            return false;
        };
        let age = age_since(self.start, meta.failed_at)
            .map(|age| format!("{} ago", age))
            .unwrap_or_default();

        self.current_hits = 0;
        let _ = write!(
            out,
            r#"<tr><td>{}</td><td><a href="{}">{} #{}</a></td><td>{}</td>"#,
            escape_html(&meta.file_type),
            escape_html(url.as_str()),
            escape_html(&meta.name),
            meta.number,
            escape_html(&age),
        );
        true
    }

    fn hit(&mut self, _out: &mut String, _event: &MatchEvent, _index: usize) -> usize {
        self.current_hits += 1;
        0
    }

    fn close_block(&mut self, out: &mut String) {
        let _ = write!(out, "<td>{}</td></tr>", self.current_hits);
    }

    fn finish(&mut self, out: &mut String) {
        out.push_str("</tbody></table>");
    }
}

//! Context view: each source becomes a block with a header linking to the job
//! run, followed by the matched text of every hit.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use super::format::{age_since, escape_html, trim_blank_lines};
use super::BlockRenderer;
use crate::models::{MatchEvent, ResolvedMetadata};

/// Renders hits as preformatted excerpts.
///
/// A source without metadata still gets a block; its header fields are
/// left empty.
pub struct ContextRenderer {
    start: DateTime<Utc>,
}

impl ContextRenderer {
    /// `start` is the moment the search began; ages are measured from it.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { start }
    }
}

impl BlockRenderer for ContextRenderer {
    fn open_block(
        &mut self,
        out: &mut String,
        _source_id: &str,
        metadata: Option<&ResolvedMetadata>,
    ) -> bool {
        let unknown = ResolvedMetadata::default();
        let meta = metadata.unwrap_or(&unknown);
        let age = age_since(self.start, meta.failed_at)
            .map(|age| format!(" {}", age))
            .unwrap_or_default();
        let url = meta.job_url.as_ref().map(|u| u.as_str()).unwrap_or("");

        let _ = write!(
            out,
            r#"<div class="mb-4"><h5 class="mb-3">{} from {} <a href="{}">{} #{}</a>{}</h5><pre class="small">"#,
            escape_html(&meta.file_type),
            escape_html(&meta.trigger),
            escape_html(url),
            escape_html(&meta.name),
            meta.number,
            escape_html(&age),
        );
        true
    }

    fn hit(&mut self, out: &mut String, event: &MatchEvent, index: usize) -> usize {
        if index > 0 {
            out.push_str("\n&mdash;\n\n");
        }
        let lines = trim_blank_lines(&event.lines);
        for line in lines {
            out.push_str(&escape_html(line.trim_end()));
            out.push('\n');
        }
        if event.elided_lines > 0 {
            let _ = write!(out, "\n... {} lines not shown\n\n", event.elided_lines);
        }
        lines.len()
    }

    fn close_block(&mut self, out: &mut String) {
        out.push_str("</pre></div>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn event(lines: &[&str], elided: usize) -> MatchEvent {
        MatchEvent {
            source_id: "build-log/pull-ci-e2e/7/build-log.txt".to_string(),
            pattern: "fail".to_string(),
            lines: lines.iter().map(|l| l.to_string()).collect(),
            elided_lines: elided,
        }
    }

    #[test]
    fn header_is_escaped_and_carries_age() {
        let start = Utc::now();
        let meta = ResolvedMetadata {
            file_type: "build log".to_string(),
            trigger: "pull".to_string(),
            name: "<job>".to_string(),
            number: 7,
            job_url: Some(Url::parse("https://ci.example.com/job?a=1&b=2").unwrap()),
            failed_at: Some(start - chrono::Duration::hours(3)),
        };
        let mut out = String::new();
        assert!(ContextRenderer::new(start).open_block(&mut out, "x", Some(&meta)));
        assert_eq!(
            out,
            r#"<div class="mb-4"><h5 class="mb-3">build log from pull <a href="https://ci.example.com/job?a=1&amp;b=2">&lt;job&gt; #7</a> 3 hours</h5><pre class="small">"#
        );
    }

    #[test]
    fn missing_metadata_renders_empty_header() {
        let mut out = String::new();
        assert!(ContextRenderer::new(Utc::now()).open_block(&mut out, "x", None));
        assert!(out.contains(r#"<h5 class="mb-3"> from  <a href=""> #0</a></h5>"#));
    }

    #[test]
    fn hits_are_trimmed_separated_and_note_elisions() {
        let mut r = ContextRenderer::new(Utc::now());
        let mut out = String::new();
        let n = r.hit(&mut out, &event(&["", "a <b>", "", "c  ", " "], 0), 0);
        assert_eq!(n, 3);
        assert_eq!(out, "a &lt;b&gt;\n\nc\n");

        out.clear();
        let n = r.hit(&mut out, &event(&["d"], 4), 1);
        assert_eq!(n, 1);
        assert_eq!(out, "\n&mdash;\n\nd\n\n... 4 lines not shown\n\n");
    }

    #[test]
    fn all_blank_hit_writes_nothing() {
        let mut out = String::new();
        let n = ContextRenderer::new(Utc::now()).hit(&mut out, &event(&["", "   "], 0), 0);
        assert_eq!(n, 0);
        assert!(out.is_empty());
    }
}

//! Match sources: where [`MatchEvent`]s come from.
//!
//! A [`MatchSource`] turns a [`Query`] into a [`MatchStream`]. The stream
//! yields events clustered by source identifier, ends cleanly when the
//! search is exhausted, and ends with an error when the backend fails or the
//! time budget runs out. Dropping the stream cancels the search.
//!
//! [`IndexSource`] searches the directory index in-process on a blocking
//! worker thread, applying each pattern with ripgrep-style smart case.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use futures::stream::{self, BoxStream, StreamExt};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::{Regex, RegexBuilder};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::SearchError;
use crate::models::{MatchEvent, SearchType};
use crate::query::Query;

/// Ordered, fallible stream of match events.
pub type MatchStream = BoxStream<'static, Result<MatchEvent, SearchError>>;

/// Events buffered between the search worker and the renderer.
const EVENT_BUFFER: usize = 64;

/// Produces match events for a query.
pub trait MatchSource: Send + Sync {
    /// Start a search that stops within `budget`.
    fn search(&self, query: &Query, budget: Duration) -> MatchStream;
}

/// Searches the artifact index at `root`.
#[derive(Clone)]
pub struct IndexSource {
    root: PathBuf,
    max_hit_lines: usize,
    max_file_bytes: u64,
    junit: GlobSet,
    build_log: GlobSet,
}

impl IndexSource {
    pub fn new(
        root: impl Into<PathBuf>,
        max_hit_lines: usize,
        max_file_bytes: u64,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            root: root.into(),
            max_hit_lines: max_hit_lines.max(1),
            max_file_bytes,
            junit: glob_set(&["junit/**"])?,
            build_log: glob_set(&["build-log/**"])?,
        })
    }

    fn classify(&self, rel: &str) -> Option<SearchType> {
        if self.junit.is_match(rel) {
            Some(SearchType::Junit)
        } else if self.build_log.is_match(rel) {
            Some(SearchType::BuildLog)
        } else {
            None
        }
    }
}

fn glob_set(patterns: &[&str]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for p in patterns {
        builder.add(Glob::new(p)?);
    }
    Ok(builder.build()?)
}

/// Compile `pattern` case-insensitively unless it contains an uppercase letter.
pub fn smart_case(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(!pattern.chars().any(char::is_uppercase))
        .build()
}

/// Everything the blocking worker needs, detached from the request.
struct Scan {
    source: IndexSource,
    patterns: Vec<String>,
    search_type: SearchType,
    job_filter: Option<Regex>,
    max_age: Duration,
    context: usize,
    budget: Duration,
    deadline: std::time::Instant,
}

type EventSender = mpsc::Sender<Result<MatchEvent, SearchError>>;

impl Scan {
    fn run(self, tx: &EventSender) {
        let mut patterns = Vec::with_capacity(self.patterns.len());
        for p in &self.patterns {
            match smart_case(p) {
                Ok(re) => patterns.push((p.as_str(), re)),
                Err(err) => {
                    let _ = tx.blocking_send(Err(err.into()));
                    return;
                }
            }
        }
        let cutoff = SystemTime::now().checked_sub(self.max_age);

        let walker = WalkDir::new(&self.source.root)
            .follow_links(false)
            .sort_by_file_name();
        for entry in walker {
            if tx.is_closed() {
                return;
            }
            if std::time::Instant::now() >= self.deadline {
                let _ = tx.blocking_send(Err(SearchError::Timeout(self.budget)));
                return;
            }
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    warn!("skipping unreadable index entry: {}", err);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(rel) = relative_id(&self.source.root, entry.path()) else {
                continue;
            };
            match self.source.classify(&rel) {
                Some(kind) if self.search_type.includes(kind) => {}
                _ => continue,
            }
            if let Some(filter) = &self.job_filter {
                if !filter.is_match(&rel) {
                    continue;
                }
            }
            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    warn!("skipping {}: {}", rel, err);
                    continue;
                }
            };
            if meta.len() > self.source.max_file_bytes {
                debug!("skipping {}: {} bytes exceeds limit", rel, meta.len());
                continue;
            }
            if let (Some(cutoff), Ok(modified)) = (cutoff, meta.modified()) {
                if modified < cutoff {
                    continue;
                }
            }

            let content = match std::fs::read(entry.path()) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(err) => {
                    warn!("skipping {}: {}", rel, err);
                    continue;
                }
            };
            let lines: Vec<&str> = content.lines().collect();
            for (pattern, re) in &patterns {
                let matched: Vec<usize> = lines
                    .iter()
                    .enumerate()
                    .filter(|(_, l)| re.is_match(l))
                    .map(|(i, _)| i)
                    .collect();
                for (start, end) in merge_windows(&matched, self.context, lines.len()) {
                    let len = end - start + 1;
                    let shown = len.min(self.source.max_hit_lines);
                    let event = MatchEvent {
                        source_id: rel.clone(),
                        pattern: pattern.to_string(),
                        lines: lines[start..start + shown]
                            .iter()
                            .map(|l| l.to_string())
                            .collect(),
                        elided_lines: len - shown,
                    };
                    if tx.blocking_send(Ok(event)).is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Source identifier for `path`: relative to `root`, `/`-separated.
fn relative_id(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    Some(parts.join("/"))
}

/// Expand matched line numbers by `context` on both sides and merge windows
/// that overlap or touch. Returns inclusive `(start, end)` pairs.
fn merge_windows(matched: &[usize], context: usize, line_count: usize) -> Vec<(usize, usize)> {
    let mut windows: Vec<(usize, usize)> = Vec::new();
    for &i in matched {
        let start = i.saturating_sub(context);
        let end = (i + context).min(line_count.saturating_sub(1));
        match windows.last_mut() {
            Some(last) if start <= last.1 + 1 => last.1 = last.1.max(end),
            _ => windows.push((start, end)),
        }
    }
    windows
}

struct Pump {
    rx: mpsc::Receiver<Result<MatchEvent, SearchError>>,
    worker: Option<JoinHandle<()>>,
    deadline: Instant,
    budget: Duration,
    done: bool,
}

impl MatchSource for IndexSource {
    fn search(&self, query: &Query, budget: Duration) -> MatchStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let scan = Scan {
            source: self.clone(),
            patterns: query.patterns.clone(),
            search_type: query.search_type,
            job_filter: query.job_filter.clone(),
            max_age: query.max_age,
            context: query.context_lines(),
            budget,
            deadline: std::time::Instant::now() + budget,
        };
        let worker = tokio::task::spawn_blocking(move || scan.run(&tx));

        let pump = Pump {
            rx,
            worker: Some(worker),
            deadline: Instant::now() + budget,
            budget,
            done: false,
        };
        stream::unfold(pump, |mut pump| async move {
            if pump.done {
                return None;
            }
            match tokio::time::timeout_at(pump.deadline, pump.rx.recv()).await {
                Ok(Some(item)) => {
                    pump.done = item.is_err();
                    Some((item, pump))
                }
                Ok(None) => {
                    pump.done = true;
                    let Some(worker) = pump.worker.take() else {
                        return None;
                    };
                    match worker.await {
                        Ok(()) => None,
                        Err(err) => Some((Err(SearchError::Worker(err.to_string())), pump)),
                    }
                }
                Err(_) => {
                    pump.done = true;
                    Some((Err(SearchError::Timeout(pump.budget)), pump))
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_merge_when_overlapping_or_adjacent() {
        assert_eq!(merge_windows(&[5], 2, 100), vec![(3, 7)]);
        assert_eq!(merge_windows(&[0, 99], 2, 100), vec![(0, 2), (97, 99)]);
        assert_eq!(merge_windows(&[3, 6], 1, 100), vec![(2, 7)]);
        assert_eq!(merge_windows(&[3, 9], 1, 100), vec![(2, 4), (8, 10)]);
        assert_eq!(merge_windows(&[4, 5], 0, 10), vec![(4, 5)]);
    }

    #[test]
    fn smart_case_only_ignores_case_for_lowercase_patterns() {
        assert!(smart_case("timeout").unwrap().is_match("Timeout waiting"));
        assert!(!smart_case("Timeout").unwrap().is_match("timeout waiting"));
    }

    #[test]
    fn relative_ids_use_forward_slashes() {
        let root = Path::new("/idx");
        assert_eq!(
            relative_id(root, &root.join("junit").join("job").join("1").join("a.xml")).as_deref(),
            Some("junit/job/1/a.xml")
        );
        assert_eq!(relative_id(root, Path::new("/elsewhere/a")), None);
    }
}

//! Result metadata: what a source identifier says about the job run behind it.
//!
//! The index stores artifacts as `<kind>/<job>/<number>/<file>`, so the job
//! name, build number and file type come straight from the identifier. The
//! failure time is the artifact's modification time.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use url::Url;

use crate::models::{ResolvedMetadata, SearchType};

/// Looks up display metadata for a source identifier.
///
/// Lookups are cheap relative to the match stream. A miss returns `None`;
/// renderers degrade rather than fail.
pub trait MetadataResolver: Send + Sync {
    fn resolve(&self, source_id: &str) -> Option<ResolvedMetadata>;
}

impl MetadataResolver for HashMap<String, ResolvedMetadata> {
    fn resolve(&self, source_id: &str) -> Option<ResolvedMetadata> {
        self.get(source_id).cloned()
    }
}

/// Resolves metadata from the on-disk index layout.
pub struct IndexMetadata {
    root: PathBuf,
    job_url_base: Option<Url>,
}

/// A source identifier split into its layout parts.
#[derive(Debug, PartialEq, Eq)]
pub struct SourcePath<'a> {
    pub kind: SearchType,
    pub job: &'a str,
    pub number: u64,
}

impl<'a> SourcePath<'a> {
    /// Parse `<kind>/<job>/<number>/<file...>`; `None` if it does not fit.
    pub fn parse(source_id: &'a str) -> Option<Self> {
        let mut parts = source_id.split('/');
        let kind = match parts.next()? {
            "junit" => SearchType::Junit,
            "build-log" => SearchType::BuildLog,
            _ => return None,
        };
        let job = parts.next().filter(|j| !j.is_empty())?;
        let number = parts.next()?.parse().ok()?;
        parts.next().filter(|f| !f.is_empty())?;
        Some(Self { kind, job, number })
    }

    /// Label shown in result headers.
    pub fn file_type(&self) -> &'static str {
        match self.kind {
            SearchType::Junit => "junit",
            _ => "build log",
        }
    }

    /// What kind of event started the job, judged by its name.
    pub fn trigger(&self) -> &'static str {
        if self.job.starts_with("pull-") {
            "pull"
        } else if self.job.starts_with("periodic-") {
            "periodic"
        } else {
            "build"
        }
    }
}

impl IndexMetadata {
    /// `job_url_base` is the prefix job links are built from; without it no
    /// source has a job URL.
    pub fn new(root: impl Into<PathBuf>, job_url_base: Option<Url>) -> Self {
        Self {
            root: root.into(),
            job_url_base,
        }
    }

    fn job_url(&self, path: &SourcePath<'_>) -> Option<Url> {
        let base = self.job_url_base.as_ref()?;
        let url = format!(
            "{}/{}/{}",
            base.as_str().trim_end_matches('/'),
            path.job,
            path.number
        );
        Url::parse(&url).ok()
    }
}

impl MetadataResolver for IndexMetadata {
    fn resolve(&self, source_id: &str) -> Option<ResolvedMetadata> {
        let path = SourcePath::parse(source_id)?;
        let failed_at = std::fs::metadata(self.root.join(source_id))
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Some(ResolvedMetadata {
            file_type: path.file_type().to_string(),
            trigger: path.trigger().to_string(),
            name: path.job.to_string(),
            number: path.number,
            job_url: self.job_url(&path),
            failed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_layout() {
        let p = SourcePath::parse("build-log/pull-ci-origin-e2e/1234/build-log.txt").unwrap();
        assert_eq!(p.kind, SearchType::BuildLog);
        assert_eq!(p.job, "pull-ci-origin-e2e");
        assert_eq!(p.number, 1234);
        assert_eq!(p.file_type(), "build log");
        assert_eq!(p.trigger(), "pull");

        assert!(SourcePath::parse("junit/job/12").is_none());
        assert!(SourcePath::parse("junit/job/x/a.xml").is_none());
        assert!(SourcePath::parse("other/job/1/a.xml").is_none());
    }

    #[test]
    fn resolves_urls_and_age_from_disk() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("junit/periodic-ci-e2e/9");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("junit.xml"), "<testsuite/>").unwrap();

        let base = Url::parse("https://ci.example.com/view/logs/").unwrap();
        let resolver = IndexMetadata::new(tmp.path(), Some(base));
        let meta = resolver.resolve("junit/periodic-ci-e2e/9/junit.xml").unwrap();
        assert_eq!(meta.file_type, "junit");
        assert_eq!(meta.trigger, "periodic");
        assert_eq!(meta.name, "periodic-ci-e2e");
        assert_eq!(meta.number, 9);
        assert_eq!(
            meta.job_url.unwrap().as_str(),
            "https://ci.example.com/view/logs/periodic-ci-e2e/9"
        );
        assert!(meta.failed_at.is_some());

        let no_links = IndexMetadata::new(tmp.path(), None);
        let meta = no_links.resolve("junit/periodic-ci-e2e/9/junit.xml").unwrap();
        assert!(meta.job_url.is_none());

        // layout match without a file on disk: age unknown
        let meta = no_links.resolve("junit/build-x/1/missing.xml").unwrap();
        assert_eq!(meta.trigger, "build");
        assert!(meta.failed_at.is_none());
    }
}

//! Corpus statistics for the landing page and `ci-search stats`.
//!
//! Walking a large index is not free, so [`IndexStats`] caches the last
//! result and only walks again once it is older than the refresh interval.

use std::path::PathBuf;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use anyhow::Result;
use walkdir::WalkDir;

use crate::config::Config;
use crate::models::CorpusStats;
use crate::render::format::human_size;

/// Reports how much is searchable.
pub trait StatsProvider: Send + Sync {
    fn stats(&self) -> CorpusStats;
}

/// Size and file count of the directory index.
pub struct IndexStats {
    root: PathBuf,
    refresh: Duration,
    cached: RwLock<Option<(Instant, CorpusStats)>>,
}

impl IndexStats {
    pub fn new(root: impl Into<PathBuf>, refresh: Duration) -> Self {
        Self {
            root: root.into(),
            refresh,
            cached: RwLock::new(None),
        }
    }

    fn walk(&self) -> CorpusStats {
        let mut stats = CorpusStats::default();
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                stats.size += meta.len();
                stats.entries += 1;
            }
        }
        stats
    }
}

impl StatsProvider for IndexStats {
    fn stats(&self) -> CorpusStats {
        if let Ok(cached) = self.cached.read() {
            if let Some((at, stats)) = *cached {
                if at.elapsed() < self.refresh {
                    return stats;
                }
            }
        }
        let stats = self.walk();
        if let Ok(mut cached) = self.cached.write() {
            *cached = Some((Instant::now(), stats));
        }
        stats
    }
}

/// Run the stats command: walk the index and print a summary.
pub fn run_stats(config: &Config) -> Result<()> {
    let stats = IndexStats::new(&config.index.root, Duration::ZERO).stats();

    println!("CI Search — Index Stats");
    println!("=======================");
    println!();
    println!("  Index:     {}", config.index.root.display());
    println!("  Size:      {}", human_size(stats.size));
    println!("  Entries:   {}", stats.entries);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn counts_files_and_caches() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("junit/job/1");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.xml"), "12345").unwrap();
        std::fs::write(dir.join("b.xml"), "123").unwrap();

        let provider = IndexStats::new(tmp.path(), Duration::from_secs(3600));
        assert_eq!(
            provider.stats(),
            CorpusStats {
                size: 8,
                entries: 2
            }
        );

        // cached: a new file is not seen until the refresh interval passes
        std::fs::write(dir.join("c.xml"), "1").unwrap();
        assert_eq!(provider.stats().entries, 2);

        let fresh = IndexStats::new(tmp.path(), Duration::ZERO);
        assert_eq!(fresh.stats().entries, 3);
    }
}

//! `ci-search search`: run a query from the command line.
//!
//! The query goes through the same normalization as the web form and the
//! rendered fragment streams to stdout; the result count and timing go to
//! stderr.

use anyhow::{bail, Result};
use chrono::Utc;
use tokio::io::BufWriter;

use crate::config::Config;
use crate::metadata::IndexMetadata;
use crate::query::{parse_query, EntryMode};
use crate::render::{self, FragmentSink, WriterSink};
use crate::source::{IndexSource, MatchSource};

/// Form-style options for a command-line search.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub patterns: Vec<String>,
    pub search_type: Option<String>,
    pub name: Option<String>,
    pub max_age: Option<String>,
    pub context: Option<i32>,
}

impl SearchArgs {
    /// The `(key, value)` pairs a browser would have sent.
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form: Vec<(String, String)> = self
            .patterns
            .iter()
            .map(|p| ("search".to_string(), p.clone()))
            .collect();
        let optional = [
            ("type", self.search_type.clone()),
            ("name", self.name.clone()),
            ("maxAge", self.max_age.clone()),
            ("context", self.context.map(|c| c.to_string())),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                form.push((key.to_string(), value));
            }
        }
        form
    }
}

pub async fn run_search(config: &Config, args: &SearchArgs) -> Result<()> {
    let query = parse_query(&args.to_form(), EntryMode::Text, config.max_age())?;
    if query.is_empty() {
        bail!("search pattern must not be empty");
    }

    let source = IndexSource::new(
        &config.index.root,
        config.search.max_hit_lines,
        config.search.max_file_bytes,
    )?;
    let metadata = IndexMetadata::new(&config.index.root, config.job_url_base());

    let mut sink = WriterSink::new(BufWriter::new(tokio::io::stdout()));
    let events = source.search(&query, config.time_budget());
    let stats = render::render(events, &query, &metadata, Utc::now(), &mut sink).await;
    sink.write("\n").await?;
    sink.flush().await?;

    eprintln!(
        "Found {} results ({} lines) in {:?}",
        stats.matched, stats.lines, stats.elapsed
    );
    if let Some(err) = stats.error {
        bail!("search failed: {}", err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_form_pairs_in_order() {
        let args = SearchArgs {
            patterns: vec!["a".into(), "b".into()],
            search_type: Some("junit".into()),
            name: None,
            max_age: Some("6h".into()),
            context: Some(-1),
        };
        let form = args.to_form();
        let keys: Vec<&str> = form.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["search", "search", "type", "maxAge", "context"]);
        assert_eq!(form[4].1, "-1");
    }
}

//! Query normalization.
//!
//! Turns raw form pairs (`search`, `type`, `name`, `maxAge`, `context`) into
//! a validated [`Query`]. A malformed request is rejected as a whole with a
//! [`QueryError`]; nothing is partially applied.

use std::time::Duration;

use regex::Regex;

use crate::error::QueryError;
use crate::models::SearchType;

/// Longest age the server searches when no ceiling is configured.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 3600);

/// Age ceiling for chart requests.
pub const CHART_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

/// Context lines shown when a text request leaves `context` unset.
pub const DEFAULT_CONTEXT: i32 = 2;

/// Largest accepted `context` value.
pub const MAX_CONTEXT: i32 = 15;

/// Job filter substituted for chart requests without a `name`.
pub const CHART_JOB_FILTER: &str = "-e2e-";

/// Failure signatures charted when a chart request names no patterns.
pub const CHART_PATTERNS: &[&str] = &[
    "could not create or restart template instance.*",
    "could not (wait for|get) build.*",
    "level=error.*timeout while waiting for state.*",
    "Container setup exited with code ., reason Error",
    "no providers available to validate pod",
    "Error deleting EBS volume .* since volume is currently attached",
    "clusteroperator/.* changed Degraded to True: .*",
    "Cluster operator .* is still updating.*",
    "Pod .* is not healthy",
    r"failed: \(.*",
];

/// Which entry point a request came through; selects the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMode {
    /// The search page and the CLI.
    Text,
    /// Failure-signature charts.
    Chart,
}

/// Which renderer a query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Per-source hit counts.
    Summary,
    /// Matched text with up to N context lines.
    Context(usize),
}

/// A normalized search request.
#[derive(Debug, Clone)]
pub struct Query {
    /// Regular expressions to search for. Never empty; an empty first
    /// pattern means no search was requested.
    pub patterns: Vec<String>,
    pub search_type: SearchType,
    /// Restricts which source identifiers qualify.
    pub job_filter: Option<Regex>,
    /// Oldest artifact age searched. Always non-zero after normalization.
    pub max_age: Duration,
    /// `-1` for the summary view, otherwise context lines per hit.
    pub context: i32,
}

impl Query {
    /// Renderer selected by `context`.
    pub fn view(&self) -> View {
        if self.context < 0 {
            View::Summary
        } else {
            View::Context(self.context as usize)
        }
    }

    /// True when the first pattern is empty (landing page).
    pub fn is_empty(&self) -> bool {
        self.patterns.first().map_or(true, |p| p.is_empty())
    }

    /// Context lines the backend should gather around each match.
    pub fn context_lines(&self) -> usize {
        match self.view() {
            View::Summary => 0,
            View::Context(n) => n,
        }
    }
}

/// Normalize form pairs into a [`Query`].
///
/// `server_max_age` is the configured ceiling; zero means
/// [`DEFAULT_MAX_AGE`]. Repeated keys other than `search` use their first
/// value.
pub fn parse_query(
    form: &[(String, String)],
    mode: EntryMode,
    server_max_age: Duration,
) -> Result<Query, QueryError> {
    let mut patterns: Vec<String> = form
        .iter()
        .filter(|(k, _)| k == "search")
        .map(|(_, v)| v.clone())
        .collect();
    if patterns.is_empty() {
        match mode {
            EntryMode::Chart => patterns.extend(CHART_PATTERNS.iter().map(|p| p.to_string())),
            EntryMode::Text => patterns.push(String::new()),
        }
    }

    let search_type = match first_value(form, "type") {
        "junit" => SearchType::Junit,
        "build-log" => SearchType::BuildLog,
        "all" | "" => SearchType::All,
        other => return Err(QueryError::SearchType(other.to_string())),
    };

    let name = first_value(form, "name");
    let job_filter = if !name.is_empty() {
        Some(Regex::new(name)?)
    } else if mode == EntryMode::Chart {
        Some(Regex::new(CHART_JOB_FILTER)?)
    } else {
        None
    };

    let mut max_age = Duration::ZERO;
    let value = first_value(form, "maxAge");
    if !value.is_empty() {
        let (negative, parsed) = parse_go_duration(value).map_err(QueryError::MaxAge)?;
        if negative && !parsed.is_zero() {
            return Err(QueryError::NegativeMaxAge);
        }
        max_age = parsed;
    }
    let mut ceiling = if server_max_age.is_zero() {
        DEFAULT_MAX_AGE
    } else {
        server_max_age
    };
    if mode == EntryMode::Chart && ceiling > CHART_MAX_AGE {
        ceiling = CHART_MAX_AGE;
    }
    if max_age.is_zero() || max_age > ceiling {
        max_age = ceiling;
    }

    let value = first_value(form, "context");
    let context = if !value.is_empty() {
        match value.parse::<i32>() {
            Ok(n) if (-1..=MAX_CONTEXT).contains(&n) => n,
            _ => return Err(QueryError::Context(value.to_string())),
        }
    } else {
        match mode {
            EntryMode::Text => DEFAULT_CONTEXT,
            EntryMode::Chart => 0,
        }
    };

    Ok(Query {
        patterns,
        search_type,
        job_filter,
        max_age,
        context,
    })
}

fn first_value<'a>(form: &'a [(String, String)], key: &str) -> &'a str {
    form.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .unwrap_or("")
}

/// Parse a Go-style duration such as `6h`, `1h30m`, `1.5s` or `0`.
///
/// Returns the sign separately so callers can reject negative values with
/// their own message.
pub fn parse_go_duration(input: &str) -> Result<(bool, Duration), String> {
    let invalid = || format!("time: invalid duration {:?}", input);

    let (negative, mut rest) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };
    if rest == "0" {
        return Ok((negative, Duration::ZERO));
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total = 0f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(invalid());
        }
        let number: f64 = rest[..number_len].parse().map_err(|_| invalid())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            "" => return Err(format!("time: missing unit in duration {:?}", input)),
            unit => return Err(format!("time: unknown unit {:?} in duration {:?}", unit, input)),
        };
        total += number * nanos_per_unit;
        rest = &rest[unit_len..];
    }

    if !total.is_finite() || total > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok((negative, Duration::from_nanos(total as u64)))
}

/// Format a duration the way Go prints one (`168h0m0s`, `1h30m0s`, `500ms`).
pub fn format_go_duration(d: Duration) -> String {
    if d.is_zero() {
        return "0s".to_string();
    }
    if d < Duration::from_secs(1) {
        let nanos = d.subsec_nanos();
        return if nanos < 1_000 {
            format!("{}ns", nanos)
        } else if nanos < 1_000_000 {
            format!("{}µs", trim_fraction(nanos as f64 / 1e3))
        } else {
            format!("{}ms", trim_fraction(nanos as f64 / 1e6))
        };
    }

    let secs = d.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = trim_fraction((secs % 60) as f64 + d.subsec_nanos() as f64 / 1e9);
    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn trim_fraction(value: f64) -> String {
    let text = format!("{:.9}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

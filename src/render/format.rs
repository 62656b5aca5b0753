//! Text helpers shared by both renderers and the page shell.

use std::borrow::Cow;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Escape text for inclusion in HTML content or a quoted attribute.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Docker-style rough duration: "Less than a second", "About an hour", "3 days".
pub fn human_duration(d: Duration) -> String {
    let seconds = d.as_secs();
    if seconds < 1 {
        return "Less than a second".to_string();
    } else if seconds == 1 {
        return "1 second".to_string();
    } else if seconds < 60 {
        return format!("{} seconds", seconds);
    }

    let minutes = seconds / 60;
    if minutes == 1 {
        return "About a minute".to_string();
    } else if minutes < 60 {
        return format!("{} minutes", minutes);
    }

    let hours = (d.as_secs_f64() / 3600.0 + 0.5) as u64;
    if hours == 1 {
        "About an hour".to_string()
    } else if hours < 48 {
        format!("{} hours", hours)
    } else if hours < 24 * 7 * 2 {
        format!("{} days", hours / 24)
    } else if hours < 24 * 30 * 2 {
        format!("{} weeks", hours / 24 / 7)
    } else if hours < 24 * 365 * 2 {
        format!("{} months", hours / 24 / 30)
    } else {
        format!("{} years", seconds / 3600 / 24 / 365)
    }
}

/// Age of a failure relative to `start`; `None` when the time is unknown.
///
/// Failures stamped after `start` (clock skew) count as zero age.
pub fn age_since(start: DateTime<Utc>, failed_at: Option<DateTime<Utc>>) -> Option<String> {
    let failed_at = failed_at?;
    let elapsed = (start - failed_at).to_std().unwrap_or(Duration::ZERO);
    Some(human_duration(elapsed))
}

/// Decimal size with four significant digits: `0B`, `12B`, `1.5kB`, `123.5MB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    let int_digits = if value < 1.0 {
        1
    } else {
        value.log10().floor() as usize + 1
    };
    let decimals = 4usize.saturating_sub(int_digits);
    let mut text = format!("{:.*}", decimals, value);
    if text.contains('.') {
        text = text.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    format!("{}{}", text, UNITS[unit])
}

/// Drop leading and trailing lines that are empty or all whitespace.
///
/// Interior blank lines are kept.
pub fn trim_blank_lines(lines: &[String]) -> &[String] {
    let is_blank = |l: &String| l.trim().is_empty();
    let Some(first) = lines.iter().position(|l| !is_blank(l)) else {
        return &[];
    };
    let last = lines.iter().rposition(|l| !is_blank(l)).unwrap_or(first);
    &lines[first..=last]
}

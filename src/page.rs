//! Page shell around the rendered results: header, search form, landing page
//! and footers.

use std::fmt::Write as _;
use std::time::Duration;

use crate::models::{CorpusStats, SearchType};
use crate::query::{format_go_duration, Query};
use crate::render::format::{escape_html, human_size};

pub const PAGE_TITLE: &str = "Search CI";

const CONTEXT_CHOICES: [(i32, &str); 9] = [
    (-1, "Links"),
    (0, "No context"),
    (1, "1 lines"),
    (2, "2 lines"),
    (3, "3 lines"),
    (5, "5 lines"),
    (7, "7 lines"),
    (10, "10 lines"),
    (15, "15 lines"),
];

const MAX_AGE_CHOICES: [(u64, &str, &str); 6] = [
    (6, "6h", "6h"),
    (12, "12h", "12h"),
    (24, "24h", "1d"),
    (48, "48h", "2d"),
    (168, "168h", "7d"),
    (336, "336h", "14d"),
];

pub fn page_start(title: &str) -> String {
    format!(
        r#"
<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8"><title>{}</title>
<link rel="stylesheet" href="https://stackpath.bootstrapcdn.com/bootstrap/4.1.3/css/bootstrap.min.css" integrity="sha384-MCw98/SFnGE8fJT3GXwEOngsV7Zt27NXFoaoApmYm81iuXoPkFOJwJ8ERdknLPMO" crossorigin="anonymous">
<meta name="viewport" content="width=device-width, initial-scale=1, shrink-to-fit=no">
</head>
<body>
<div class="container-fluid">
"#,
        escape_html(title)
    )
}

pub const PAGE_END: &str = r#"
</div>
</body>
</html>
"#;

fn selected(yes: bool) -> &'static str {
    if yes {
        "selected"
    } else {
        ""
    }
}

/// The search form, pre-filled from `query`.
pub fn search_form(query: &Query) -> String {
    let mut max_age = String::new();
    for (hours, value, label) in MAX_AGE_CHOICES {
        let _ = write!(
            max_age,
            r#"<option value="{}" {}>{}</option>"#,
            value,
            selected(query.max_age == Duration::from_secs(hours * 3600)),
            label
        );
    }
    let standard_age = MAX_AGE_CHOICES
        .iter()
        .any(|(hours, _, _)| query.max_age == Duration::from_secs(hours * 3600));
    if query.max_age.is_zero() {
        max_age.push_str(r#"<option value="0" selected>No limit</option>"#);
    } else if !standard_age {
        let value = escape_html(&format_go_duration(query.max_age)).into_owned();
        let _ = write!(max_age, r#"<option value="{0}" selected>{0}</option>"#, value);
    }

    let mut context = String::new();
    for (value, label) in CONTEXT_CHOICES {
        let _ = write!(
            context,
            r#"<option value="{}" {}>{}</option>"#,
            value,
            selected(query.context == value),
            label
        );
    }
    if !CONTEXT_CHOICES.iter().any(|(v, _)| *v == query.context) {
        let _ = write!(
            context,
            r#"<option value="{0}" selected>{0}</option>"#,
            query.context
        );
    }

    let mut search_type = String::new();
    for t in SearchType::ALL {
        let _ = write!(
            search_type,
            r#"<option value="{0}" {1}>{0}</option>"#,
            t.as_str(),
            selected(t == query.search_type)
        );
    }

    let search = query.patterns.first().map(String::as_str).unwrap_or("");
    format!(
        r#"
<form class="form mt-4 mb-4" method="GET">
	<div class="input-group input-group-lg"><input autocomplete="off" autofocus name="search" class="form-control col-auto" value="{}" placeholder="Search CI failures by entering a regex search ...">
	<select name="maxAge" class="form-control col-1" onchange="this.form.submit();">{}</select>
	<select name="context" class="form-control col-1" onchange="this.form.submit();">{}</select>
	<select name="type" class="form-control col-1" onchange="this.form.submit();">{}</select>
	<input class="btn" type="submit" value="Search">
	</div>
</form>
"#,
        escape_html(search),
        max_age,
        context,
        search_type
    )
}

/// Help text shown when no search was entered.
pub fn landing(stats: CorpusStats) -> String {
    format!(
        r#"
<div class="ml-3" style="margin-top: 3rem; color: #666;">
<p>Find JUnit test failures and build log errors from <a href="/config">a subset of CI jobs</a>.</p>
<p>The search input uses <a href="https://docs.rs/regex/latest/regex/#syntax">Rust regular-expression syntax</a>.</p>
<p>Searches are case-insensitive unless the pattern contains an uppercase letter.</p>
<p>Examples:
<ul>
<li><code>timeout</code> - all failures with 'timeout' in the result</li>
<li><code>status code \d{{3}}\s</code> - all failures that contain 'status code' followed by a 3 digit number</li>
</ul>
<p>You can alter the age of results to search with the dropdown next to the search bar. Note that older results are pruned and may not be available after 14 days.</p>
<p>The amount of surrounding text returned with each match can be changed, including none.</p>
<p>Currently indexing {} across {} entries</p>
</div>
"#,
        human_size(stats.size),
        stats.entries
    )
}

/// Opens the results container.
pub const RESULTS_START: &str = r#"<div style="margin-top: 3rem; position: relative" class="pl-3">"#;

/// Closes the results container with a count and timing line.
pub fn results_end(count: usize, elapsed: Duration, stats: CorpusStats) -> String {
    let elapsed = Duration::from_millis(elapsed.as_millis() as u64);
    format!(
        r#"<p style="position:absolute; top: -2rem;" class="small"><em>Found {} results in {} ({} in {} entries)</em></p></div>"#,
        count,
        format_go_duration(elapsed),
        human_size(stats.size),
        stats.entries
    )
}

/// Visible notice appended after partial results when a search fails.
pub fn error_notice(message: &str) -> String {
    format!(
        r#"<p class="alert alert-danger">{}</p></div>"#,
        escape_html(message)
    )
}

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use tempfile::TempDir;
use tokio::net::TcpListener;

use ci_search::config::Config;
use ci_search::error::SearchError;
use ci_search::models::MatchEvent;
use ci_search::query::{parse_query, EntryMode, Query};
use ci_search::server::{serve, AppState};
use ci_search::source::{IndexSource, MatchSource};

fn write_artifact(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn setup_index() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_artifact(
        root,
        "build-log/pull-ci-origin-e2e/100/build-log.txt",
        "step 1\nerror: timeout waiting for pod <web-0>\nstep 3\n",
    );
    write_artifact(
        root,
        "junit/periodic-ci-e2e-aws/7/junit.xml",
        "<testsuite>\n<failure>Timeout exceeded</failure>\n</testsuite>\n",
    );
    write_artifact(
        root,
        "build-log/periodic-ci-unit/3/build-log.txt",
        "all tests passed\n",
    );
    tmp
}

fn test_config(index: &Path) -> Config {
    let mut config = Config::for_index(index);
    config.index.job_url_base = Some("https://ci.example.com/view".to_string());
    config
}

async fn start_server(config: Config) -> SocketAddr {
    let state = AppState::from_config(&config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, state));
    addr
}

fn query(pairs: &[(&str, &str)]) -> Query {
    let form: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    parse_query(&form, EntryMode::Text, Duration::ZERO).unwrap()
}

async fn collect(source: &IndexSource, q: &Query, budget: Duration) -> Vec<Result<MatchEvent, SearchError>> {
    source.search(q, budget).collect().await
}

// ============ HTTP ============

#[tokio::test]
async fn test_landing_page_shows_index_size() {
    let index = setup_index();
    let addr = start_server(test_config(index.path())).await;

    let resp = reqwest::get(format!("http://{}/", addr)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("<title>Search CI</title>"));
    assert!(body.contains("across 3 entries"));
    assert!(body.trim_end().ends_with("</html>"));
}

#[tokio::test]
async fn test_search_streams_results_and_footer() {
    let index = setup_index();
    let addr = start_server(test_config(index.path())).await;

    let resp = reqwest::get(format!("http://{}/?search=timeout&context=0", addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let body = resp.text().await.unwrap();

    assert!(body.contains(
        r#"<a href="https://ci.example.com/view/pull-ci-origin-e2e/100">pull-ci-origin-e2e #100</a>"#
    ));
    assert!(body.contains("periodic-ci-e2e-aws #7"));
    assert!(body.contains("error: timeout waiting for pod &lt;web-0&gt;\n"));
    assert!(!body.contains("step 1"));
    assert!(body.contains("<em>Found 2 results in "));
    assert!(body.trim_end().ends_with("</html>"));
}

#[tokio::test]
async fn test_search_summary_view_and_type_filter() {
    let index = setup_index();
    let addr = start_server(test_config(index.path())).await;

    let body = reqwest::get(format!("http://{}/?search=timeout&context=-1&type=junit", addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("<th># of hits</th>"));
    assert!(body.contains("periodic-ci-e2e-aws #7"));
    assert!(!body.contains("pull-ci-origin-e2e"));
    assert!(body.contains("<td>1</td></tr></tbody></table>"));
    assert!(body.contains("Found 1 results in "));
}

#[tokio::test]
async fn test_bad_input_is_rejected_before_streaming() {
    let index = setup_index();
    let addr = start_server(test_config(index.path())).await;

    let resp = reqwest::get(format!("http://{}/?search=x&type=bogus", addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(
        resp.text().await.unwrap(),
        "Bad input: search must be 'junit', 'build-log', or 'all'"
    );

    let resp = reqwest::get(format!("http://{}/?search=x&context=16", addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = reqwest::get(format!("http://{}/?search=x&maxAge=-2h", addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_invalid_pattern_reported_inline() {
    let index = setup_index();
    let addr = start_server(test_config(index.path())).await;

    let resp = reqwest::get(format!("http://{}/?search=%28unclosed", addr))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains(r#"<p class="alert alert-danger">invalid search pattern"#));
    assert!(!body.contains("Found "));
}

#[tokio::test]
async fn test_config_page() {
    let index = setup_index();
    let addr = start_server(test_config(index.path())).await;
    let resp = reqwest::get(format!("http://{}/config", addr)).await.unwrap();
    assert_eq!(resp.status(), 204);

    let page = index.path().join("jobs.txt");
    fs::write(&page, "periodic-ci-e2e-aws\n").unwrap();
    let mut config = test_config(index.path());
    config.server.config_page = Some(page.clone());
    let addr = start_server(config).await;
    let resp = reqwest::get(format!("http://{}/config", addr)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "periodic-ci-e2e-aws\n");

    fs::remove_file(&page).unwrap();
    let resp = reqwest::get(format!("http://{}/config", addr)).await.unwrap();
    assert_eq!(resp.status(), 500);
    assert!(resp
        .text()
        .await
        .unwrap()
        .starts_with("Unable to read config: "));
}

#[tokio::test]
async fn test_health() {
    let index = setup_index();
    let addr = start_server(test_config(index.path())).await;
    let body: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

// ============ IndexSource ============

#[tokio::test]
async fn test_index_source_filters_by_type_and_name() {
    let index = setup_index();
    let source = IndexSource::new(index.path(), 30, 1 << 20).unwrap();
    let budget = Duration::from_secs(10);

    let all = collect(&source, &query(&[("search", "timeout")]), budget).await;
    assert_eq!(all.len(), 2);

    let junit = collect(
        &source,
        &query(&[("search", "timeout"), ("type", "junit")]),
        budget,
    )
    .await;
    assert_eq!(junit.len(), 1);
    assert_eq!(
        junit[0].as_ref().unwrap().source_id,
        "junit/periodic-ci-e2e-aws/7/junit.xml"
    );

    let named = collect(
        &source,
        &query(&[("search", "timeout"), ("name", "^build-log/pull-")]),
        budget,
    )
    .await;
    assert_eq!(named.len(), 1);
    let event = named[0].as_ref().unwrap();
    assert_eq!(event.source_id, "build-log/pull-ci-origin-e2e/100/build-log.txt");
    // default context is two lines each side
    assert_eq!(event.lines.len(), 3);
}

#[tokio::test]
async fn test_index_source_groups_patterns_per_source() {
    let index = setup_index();
    let source = IndexSource::new(index.path(), 30, 1 << 20).unwrap();
    let q = query(&[("search", "step"), ("search", "pod"), ("context", "0")]);

    let events: Vec<MatchEvent> = collect(&source, &q, Duration::from_secs(10))
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();
    let patterns: Vec<&str> = events.iter().map(|e| e.pattern.as_str()).collect();
    assert_eq!(patterns, vec!["step", "step", "pod"]);
    assert!(events
        .iter()
        .all(|e| e.source_id == "build-log/pull-ci-origin-e2e/100/build-log.txt"));
}

#[tokio::test]
async fn test_index_source_elides_long_hits() {
    let tmp = TempDir::new().unwrap();
    write_artifact(
        tmp.path(),
        "build-log/job/1/build-log.txt",
        "fail 1\nfail 2\nfail 3\nfail 4\nfail 5\n",
    );
    let source = IndexSource::new(tmp.path(), 2, 1 << 20).unwrap();
    let events = collect(
        &source,
        &query(&[("search", "fail"), ("context", "0")]),
        Duration::from_secs(10),
    )
    .await;

    assert_eq!(events.len(), 1);
    let event = events[0].as_ref().unwrap();
    assert_eq!(event.lines, vec!["fail 1", "fail 2"]);
    assert_eq!(event.elided_lines, 3);
}

#[tokio::test]
async fn test_index_source_skips_large_files() {
    let index = setup_index();
    let source = IndexSource::new(index.path(), 30, 8).unwrap();
    let events = collect(&source, &query(&[("search", "timeout")]), Duration::from_secs(10)).await;
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_index_source_reports_bad_pattern() {
    let index = setup_index();
    let source = IndexSource::new(index.path(), 30, 1 << 20).unwrap();
    let events = collect(&source, &query(&[("search", "(")]), Duration::from_secs(10)).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Err(SearchError::Pattern(_))));
}

#[tokio::test]
async fn test_index_source_times_out() {
    let index = setup_index();
    let source = IndexSource::new(index.path(), 30, 1 << 20).unwrap();
    let events = collect(&source, &query(&[("search", "timeout")]), Duration::ZERO).await;
    assert!(matches!(events.last(), Some(Err(SearchError::Timeout(_)))));
}

//! # CI Search
//!
//! Regular-expression search over failed CI job artifacts (JUnit results and
//! build logs), with results rendered to HTML and streamed to the browser
//! while the search is still running.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ MatchSource │──▶│ render::drive │──▶│ FragmentSink   │
//! │ (index walk)│   │ block grouping│   │ HTTP / stdout  │
//! └─────────────┘   └──────┬───────┘   └────────────────┘
//!                          │
//!                   ┌──────┴──────┐
//!                   ▼             ▼
//!             ┌──────────┐  ┌──────────┐
//!             │ Context  │  │ Summary  │
//!             │ renderer │  │ renderer │
//!             └──────────┘  └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ci-search serve                          # start the web UI
//! ci-search search 'timeout' --type junit  # one search, HTML on stdout
//! ci-search stats                          # index size
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error types |
//! | [`models`] | Core data types |
//! | [`query`] | Request normalization |
//! | [`source`] | Search backend over the directory index |
//! | [`metadata`] | Per-artifact metadata lookup |
//! | [`render`] | Result renderers and output sinks |
//! | [`page`] | Page shell around the results |
//! | [`server`] | HTTP server |
//! | [`search`] | Command-line search |
//! | [`stats`] | Corpus statistics |

pub mod config;
pub mod error;
pub mod metadata;
pub mod models;
pub mod page;
pub mod query;
pub mod render;
pub mod search;
pub mod server;
pub mod source;
pub mod stats;

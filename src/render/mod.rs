//! Result-streaming renderers.
//!
//! Both views consume a [`MatchStream`] in a single forward pass and write an
//! HTML fragment to a [`FragmentSink`] while the search is still running.
//! They share one driver, [`drive`], which owns the grouping state machine and
//! the flush cadence; the views only decide what markup each step emits
//! through the [`BlockRenderer`] trait.
//!
//! # Grouping
//!
//! A block is the run of consecutive events sharing a source identifier.
//! Only the previous identifier is remembered, so a source that reappears
//! later opens a new block. Metadata is resolved once per block.
//!
//! # Flushing
//!
//! The sink is flushed after the first block opens, after every
//! [`FLUSH_EVERY`]th block, and once more when the stream ends. A backend
//! error still closes the open block and flushes; a sink error stops
//! everything immediately.

pub mod context;
pub mod format;
pub mod sink;
pub mod summary;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, warn};

use crate::error::{RenderError, SinkError};
use crate::metadata::MetadataResolver;
use crate::models::{MatchEvent, ResolvedMetadata};
use crate::query::{Query, View};
use crate::source::MatchStream;

pub use context::ContextRenderer;
pub use sink::{ChannelSink, WriterSink};
pub use summary::SummaryRenderer;

/// Blocks opened between periodic flushes.
pub const FLUSH_EVERY: usize = 50;

/// Destination for rendered markup, usually an HTTP response body.
#[async_trait]
pub trait FragmentSink: Send {
    /// Queue markup for delivery. Implementations may buffer.
    async fn write(&mut self, markup: &str) -> Result<(), SinkError>;

    /// Deliver everything queued so far to the client.
    async fn flush(&mut self) -> Result<(), SinkError>;

    /// Resolves once the client has gone away. Never resolves by default.
    async fn closed(&mut self) {
        std::future::pending::<()>().await
    }
}

/// Markup strategy for one view. All methods append to `out`.
pub trait BlockRenderer: Send {
    /// Markup written before any event is consumed.
    fn begin(&mut self, _out: &mut String) {}

    /// Start a block for `source_id`. Returning `false` skips the block: its
    /// events are consumed but nothing is written for them.
    fn open_block(
        &mut self,
        out: &mut String,
        source_id: &str,
        metadata: Option<&ResolvedMetadata>,
    ) -> bool;

    /// Render one hit; `index` is its position within the block. Returns the
    /// number of text lines written.
    fn hit(&mut self, out: &mut String, event: &MatchEvent, index: usize) -> usize;

    /// End the open block.
    fn close_block(&mut self, out: &mut String);

    /// Markup written after the stream ends (not after a disconnect).
    fn finish(&mut self, _out: &mut String) {}
}

/// Outcome of one render call.
#[derive(Debug, Default)]
pub struct RenderStats {
    /// Blocks (context view) or rows (summary view) written.
    pub matched: usize,
    /// Text lines written across all hits.
    pub lines: usize,
    /// Events consumed, including those of skipped blocks.
    pub hits: usize,
    pub elapsed: Duration,
    /// Why rendering stopped early, if it did.
    pub error: Option<RenderError>,
}

enum BlockState {
    None,
    Open { hits: usize },
    Skipped,
}

/// Render `events` with the view selected by `query.context`.
pub async fn render<S: FragmentSink + ?Sized>(
    events: MatchStream,
    query: &Query,
    resolver: &dyn MetadataResolver,
    start: DateTime<Utc>,
    sink: &mut S,
) -> RenderStats {
    match query.view() {
        View::Context(_) => render_context(events, resolver, start, sink).await,
        View::Summary => render_summary(events, resolver, start, sink).await,
    }
}

/// Render matched text grouped by source.
pub async fn render_context<S: FragmentSink + ?Sized>(
    events: MatchStream,
    resolver: &dyn MetadataResolver,
    start: DateTime<Utc>,
    sink: &mut S,
) -> RenderStats {
    drive(events, &mut ContextRenderer::new(start), resolver, sink).await
}

/// Render one table row per source with its hit count.
pub async fn render_summary<S: FragmentSink + ?Sized>(
    events: MatchStream,
    resolver: &dyn MetadataResolver,
    start: DateTime<Utc>,
    sink: &mut S,
) -> RenderStats {
    drive(events, &mut SummaryRenderer::new(start), resolver, sink).await
}

/// Consume `events` in order, grouping them into blocks rendered by `renderer`.
pub async fn drive<R, S>(
    mut events: MatchStream,
    renderer: &mut R,
    resolver: &dyn MetadataResolver,
    sink: &mut S,
) -> RenderStats
where
    R: BlockRenderer + ?Sized,
    S: FragmentSink + ?Sized,
{
    let started = Instant::now();
    let mut stats = RenderStats::default();
    let mut out = String::new();
    let mut last_source: Option<String> = None;
    let mut block = BlockState::None;

    renderer.begin(&mut out);

    let stopped = loop {
        let next = tokio::select! {
            biased;
            _ = sink.closed() => break Some(RenderError::Sink(SinkError::Closed)),
            next = events.next() => next,
        };
        let event = match next {
            None => break None,
            Some(Err(err)) => break Some(RenderError::Search(err)),
            Some(Ok(event)) => event,
        };
        stats.hits += 1;

        let mut flush_now = false;
        if last_source.as_deref() != Some(event.source_id.as_str()) {
            if let BlockState::Open { .. } = block {
                renderer.close_block(&mut out);
            }
            let metadata = resolver.resolve(&event.source_id);
            block = if renderer.open_block(&mut out, &event.source_id, metadata.as_ref()) {
                stats.matched += 1;
                flush_now = stats.matched == 1 || stats.matched % FLUSH_EVERY == 0;
                BlockState::Open { hits: 0 }
            } else {
                BlockState::Skipped
            };
            last_source = Some(event.source_id.clone());
        }

        if let BlockState::Open { hits } = &mut block {
            stats.lines += renderer.hit(&mut out, &event, *hits);
            *hits += 1;
        }

        if let Err(err) = sink.write(&out).await {
            break Some(err.into());
        }
        out.clear();
        if flush_now {
            if let Err(err) = sink.flush().await {
                break Some(err.into());
            }
        }
    };

    stats.error = match stopped {
        Some(err @ RenderError::Sink(_)) => {
            debug!(matched = stats.matched, "render abandoned: {}", err);
            Some(err)
        }
        stopped => {
            if let BlockState::Open { .. } = block {
                renderer.close_block(&mut out);
            }
            renderer.finish(&mut out);
            let delivered = match sink.write(&out).await {
                Ok(()) => sink.flush().await,
                Err(err) => Err(err),
            };
            match (stopped, delivered) {
                (None, Err(err)) => Some(err.into()),
                (Some(err), Err(sink_err)) => {
                    warn!("unable to flush results after search error: {}", sink_err);
                    Some(err)
                }
                (stopped, Ok(())) => stopped,
            }
        }
    };
    stats.elapsed = started.elapsed();
    stats
}

use async_stream::stream;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use spotpass_registry::Platform;
use std::collections::VecDeque;

use crate::Context;
use crate::crawl::item::{Crawled, crawl_item};
use crate::error::{ErrorKind, Result};

/// Progress events emitted by [`crawl`] as it drains the work queue.
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started): exactly once.
/// 2. [`Batch`](Self::Batch): once per claimed batch, with its size.
/// 3. [`Crawled`](Self::Crawled): once per item of the preceding batch.
/// 4. [`Complete`](Self::Complete): exactly once, when nothing is left to
///    claim.
///
/// An error releasing or claiming a batch terminates the stream early, in
/// which case [`Complete`](Self::Complete) is never emitted.
#[derive(Debug)]
pub enum CrawlEvent {
    Started,
    Batch(usize),
    Crawled(Box<Crawled>),
    Complete,
}

/// Streams [`CrawlEvent`]s while draining every unprocessed work item of
/// `platform` from the queue.
///
/// Items are claimed `ctx.batch_size` at a time and crawled concurrently, at
/// most `ctx.concurrency` at once. Further items of the batch are started as
/// in-flight ones complete; the next batch is only claimed once the current
/// one is finished.
///
/// A crawl is the only consumer of `platform`'s queue: it starts by releasing
/// claims left behind by an interrupted run, so those items are crawled now.
///
/// A failed item is surfaced as an `Err` without terminating the stream. It
/// stays claimed and unprocessed, so this run does not retry it but the next
/// one will.
pub fn crawl<'a>(ctx: &'a Context, platform: Platform) -> impl Stream<Item = Result<CrawlEvent>> + 'a {
    // `rustfmt` does not format macros that use braces. Wrap in parentheses!
    stream!({
        yield Ok(CrawlEvent::Started);

        if let Err(e) = ctx.queue.release_claims(platform).await.or_raise(|| ErrorKind::Queue) {
            yield Err(e);
            return;
        }

        loop {
            let batch = match ctx.queue.next_batch(platform, ctx.batch_size).await.or_raise(|| ErrorKind::Queue) {
                Ok(batch) => batch,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            if batch.is_empty() {
                break;
            }
            yield Ok(CrawlEvent::Batch(batch.len()));

            let mut waiting: VecDeque<_> = batch.into_iter().map(|item| crawl_item(ctx, item)).collect();
            let mut processing = FuturesUnordered::new();
            processing.extend(waiting.drain(..ctx.concurrency.max(1).min(waiting.len())));
            while let Some(result) = processing.next().await {
                yield result.map(|crawled| CrawlEvent::Crawled(Box::new(crawled)));
                // Pop-n-push, in queue order.
                if let Some(next) = waiting.pop_front() {
                    processing.push(next);
                }
            }
        }

        yield Ok(CrawlEvent::Complete);
    })
}

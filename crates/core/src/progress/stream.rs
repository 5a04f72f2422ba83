use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use tokio::time::{Interval, MissedTickBehavior};

use super::registry::ProgressRegistry;
use crate::ingest::{ImportKind, ImportSnapshot};

struct Sampler {
    registry: Arc<ProgressRegistry>,
    ticker: Interval,
    first: bool,
}

/// Sample `kind`'s progress every `period` until it turns terminal.
///
/// The first sample is taken immediately. A kind with no registered session
/// yields a single synthetic [`ImportSnapshot::no_upload`] and ends; an entry
/// evicted mid-stream ends the stream silently. Dropping the stream drops
/// its timer, so a disconnected consumer leaves nothing running.
pub fn progress_stream(
    registry: Arc<ProgressRegistry>,
    kind: ImportKind,
    period: Duration,
) -> impl Stream<Item = ImportSnapshot> + Send + 'static {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let initial = Sampler {
        registry,
        ticker,
        first: true,
    };

    stream::unfold(Some(initial), move |state| async move {
        let mut sampler = state?;
        sampler.ticker.tick().await;

        match sampler.registry.get(kind).await {
            None if sampler.first => Some((ImportSnapshot::no_upload(kind), None)),
            None => None,
            Some(snapshot) if snapshot.terminal => Some((snapshot, None)),
            Some(snapshot) => {
                sampler.first = false;
                Some((snapshot, Some(sampler)))
            }
        }
    })
}

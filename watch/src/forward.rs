//! Turns bursts of descriptor events into restart calls.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::watcher::WatchEvent;

/// Forward watch events to `on_change` until every sender is gone.
///
/// Editors tend to save in several steps (truncate, write, rename), so
/// events are coalesced: `on_change` runs once the channel has been quiet
/// for `debounce`, with the last event of the burst. A burst still pending
/// when the channel closes is delivered before returning.
///
/// Returns the number of times `on_change` ran.
pub async fn forward_events<F, Fut>(
    mut events: mpsc::UnboundedReceiver<WatchEvent>,
    debounce: Duration,
    mut on_change: F,
) -> usize
where
    F: FnMut(WatchEvent) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut forwarded = 0;
    let mut pending: Option<WatchEvent> = None;
    let mut deadline = Instant::now();

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Some(event) => {
                    if pending.is_some() {
                        tracing::trace!(path = %event.path.display(), "Coalescing descriptor event");
                    }
                    pending = Some(event);
                    deadline = Instant::now() + debounce;
                }
                None => break,
            },
            () = tokio::time::sleep_until(deadline), if pending.is_some() => {
                if let Some(event) = pending.take() {
                    tracing::info!(
                        path = %event.path.display(),
                        kind = ?event.kind,
                        "Project descriptor changed"
                    );
                    on_change(event).await;
                    forwarded += 1;
                }
            }
        }
    }

    if let Some(event) = pending.take() {
        on_change(event).await;
        forwarded += 1;
    }
    forwarded
}

//! Change feed for remote dashboards.
//!
//! Browser dashboards cannot register a callback on the store directly, so the server
//! subscribes once on their behalf and fans notifications out over a tokio broadcast channel,
//! served as Server-Sent Events on `GET /events`. Each event is named `changed` and carries
//! no data; clients re-fetch `/patients` when they see one.
//!
//! Writes made by other processes on the same slot reach the feed through a background task
//! that polls [`FlowStore::sync_external`].

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use flow_core::{FlowStore, Subscription};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::{wrappers::BroadcastStream, StreamExt as _};

use crate::AppState;

/// SSE event name sent for every store change.
pub const CHANGED_EVENT: &str = "changed";

/// Broadcasts store notifications to any number of async listeners.
///
/// Cloning shares the channel. The store subscription is released when the last clone is
/// dropped.
#[derive(Clone, Debug)]
pub struct ChangeFeed {
    tx: broadcast::Sender<()>,
    _subscription: Arc<Subscription>,
}

impl ChangeFeed {
    pub fn attach(store: &FlowStore, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        let sender = tx.clone();
        let subscription = store.subscribe(move || {
            // No listeners is fine; the notification is fire-and-forget.
            let _ = sender.send(());
        });

        Self {
            tx,
            _subscription: Arc::new(subscription),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[utoipa::path(
    get,
    path = "/events",
    responses(
        (status = 200, description = "Server-Sent Events stream of payload-free `changed` events")
    )
)]
/// Stream store change notifications.
///
/// A lagging client that missed notifications still receives a `changed` event, which is
/// all it needs to re-read.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.feed.subscribe())
        .map(|_| Ok::<_, Infallible>(Event::default().event(CHANGED_EVENT).data("")));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Polls the backing slot for writes by other processes every `interval`.
pub fn spawn_sync_task(store: Arc<FlowStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let store = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || store.sync_external()).await {
                Ok(Ok(true)) => tracing::debug!("picked up external flow write"),
                Ok(Ok(false)) => {}
                Ok(Err(e)) => tracing::warn!("flow sync failed: {e}"),
                Err(e) => tracing::error!("flow sync task panicked: {e}"),
            }
        }
    })
}

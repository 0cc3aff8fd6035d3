//! Server-Sent Events (SSE) stream
//!
//! Streams the player's `InterviewEvent`s; the SSE event name is the
//! event type so browsers can `addEventListener("ActiveLineChanged", ..)`.

use crate::api::server::AppContext;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use stellar_common::InterviewEvent;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// GET /events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let bus = ctx.player.event_bus();
    debug!(
        "SSE client connected ({} listeners, {} events buffered per client)",
        bus.subscriber_count() + 1,
        bus.capacity()
    );

    let events = BroadcastStream::new(ctx.player.events())
        .filter_map(|received| async move { to_sse(received).map(Ok) });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

/// SSE frame for one received event; None skips it
fn to_sse(received: Result<InterviewEvent, BroadcastStreamRecvError>) -> Option<Event> {
    let event = match received {
        Ok(event) => event,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!("SSE client lagged, {} events skipped", skipped);
            return None;
        }
    };

    match serde_json::to_string(&event) {
        Ok(json) => Some(Event::default().event(event.event_type()).data(json)),
        Err(e) => {
            warn!("Failed to serialize {}: {}", event.event_type(), e);
            None
        }
    }
}

use axum::response::{
    IntoResponse, Response, Sse,
    sse::{Event, KeepAlive},
};
use futures::stream::{Stream, StreamExt};
use std::{convert::Infallible, time::Duration};
use tracing::debug;

use crate::domain::value_objects::ChatStreamEvent;

/// Named SSE event carrying the JSON form of a chat event.
pub fn to_sse_event(event: &ChatStreamEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_default();
    Event::default().event(event.event_name()).data(data)
}

pub fn chat_event_stream<S>(events: S) -> Response
where
    S: Stream<Item = ChatStreamEvent> + Send + 'static,
{
    create_sse_response(events.map(|event| {
        if event.is_terminal() {
            debug!(event = event.event_name(), "Sending terminal chat event");
        }
        Ok::<_, Infallible>(to_sse_event(&event))
    }))
}

pub fn create_sse_response<S>(stream: S) -> Response
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("keep-alive"),
        )
        .into_response()
}

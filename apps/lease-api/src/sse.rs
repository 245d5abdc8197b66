//! Server-sent events transport for session progress
//!
//! Each connection drains its session on a fixed interval, waking early
//! when the pipeline publishes. The stream ends after the terminal event.
//! Dropping the stream (client disconnect or completion) disposes the
//! session's queue; the pipeline itself keeps running. A disposed session
//! answers 404 so EventSource clients stop reconnecting.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use lease_analysis::ProgressChannel;
use lease_types::ProgressEvent;
use tokio::sync::Notify;

use crate::error::ApiError;
use crate::state::SharedState;

/// One consumer attached to a session's progress queue
struct Subscription {
    channel: Arc<ProgressChannel>,
    session_id: String,
    notify: Arc<Notify>,
    poll_interval: Duration,
}

impl Subscription {
    fn attach(channel: Arc<ProgressChannel>, session_id: String, poll_interval: Duration) -> Option<Self> {
        let notify = channel.attach(&session_id)?;
        Some(Self {
            channel,
            session_id,
            notify,
            poll_interval,
        })
    }

    /// Wait until at least one event is queued and take everything queued
    async fn next_batch(&self) -> Vec<ProgressEvent> {
        loop {
            let events = self.channel.drain(&self.session_id);
            if !events.is_empty() {
                return events;
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.channel.dispose(&self.session_id);
        tracing::debug!("Progress stream closed for session {}", self.session_id);
    }
}

fn to_sse_event(event: &ProgressEvent) -> Event {
    Event::default()
        .event(event.status.as_str())
        .json_data(event)
        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()))
}

/// Stream of events for a subscription, ending after the terminal event
fn progress_events(subscription: Subscription) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(Some(subscription), |subscription| async move {
        let subscription = subscription?;
        let events = subscription.next_batch().await;
        let finished = events.iter().any(|e| e.terminal);

        let batch: Vec<Result<Event, Infallible>> =
            events.iter().map(|e| Ok(to_sse_event(e))).collect();
        let next = if finished { None } else { Some(subscription) };
        Some((stream::iter(batch), next))
    })
    .flatten()
}

pub async fn progress(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let subscription = Subscription::attach(
        Arc::clone(&state.progress),
        session_id.clone(),
        state.config.progress_poll_interval,
    )
    .ok_or_else(|| ApiError::NotFound(format!("progress session {}", session_id)))?;

    tracing::info!("Progress stream opened for session {}", session_id);
    Ok(Sse::new(progress_events(subscription)).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lease_types::ProgressStatus;

    #[tokio::test]
    async fn test_stream_ends_after_terminal_event_and_disposes() {
        let channel = Arc::new(ProgressChannel::default());
        channel.publish("s1", "Validating file...", ProgressStatus::Active, None);
        channel.publish_event(
            "s1",
            ProgressEvent::new("Saving results...", ProgressStatus::Completed).terminal(),
        );

        let subscription =
            Subscription::attach(Arc::clone(&channel), "s1".to_string(), Duration::from_millis(5))
                .unwrap();
        let events: Vec<_> = progress_events(subscription).collect().await;

        assert_eq!(events.len(), 2);
        assert!(channel.is_disposed("s1"));
    }

    #[test]
    fn test_disposed_session_cannot_be_attached() {
        let channel = Arc::new(ProgressChannel::default());
        channel.dispose("gone");

        let subscription =
            Subscription::attach(Arc::clone(&channel), "gone".to_string(), Duration::from_millis(5));
        assert!(subscription.is_none());
    }

    #[tokio::test]
    async fn test_waits_for_late_events() {
        let channel = Arc::new(ProgressChannel::default());
        let subscription =
            Subscription::attach(Arc::clone(&channel), "s2".to_string(), Duration::from_secs(5))
                .unwrap();

        let producer = Arc::clone(&channel);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.publish_event(
                "s2",
                ProgressEvent::new("Validating file...", ProgressStatus::Error).terminal(),
            );
        });

        let events: Vec<_> = tokio::time::timeout(
            Duration::from_secs(2),
            progress_events(subscription).collect::<Vec<_>>(),
        )
        .await
        .unwrap();
        assert_eq!(events.len(), 1);
    }
}

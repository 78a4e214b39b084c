//! Job state change notifications.

use crate::job::{Identity, JobState};
use async_stream::stream;
use futures::Stream;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// How many events a slow subscriber may fall behind before it starts
/// missing some.
pub(crate) const EVENT_CAPACITY: usize = 1024;

/// A job moved to a new state. Terminal states carry the job's
/// [`Outcome`](crate::Outcome) or [`Failure`](crate::Failure).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobEvent {
    pub identity: Identity,
    pub state: JobState,
}

/// Turn a broadcast subscription into a stream that ends when the scheduler
/// is gone. Lagging subscribers skip ahead instead of failing.
pub(crate) fn stream(mut receiver: broadcast::Receiver<JobEvent>) -> impl Stream<Item = JobEvent> + Send + 'static {
    stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => yield event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber fell behind; events dropped");
                },
                Err(RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn event(path: &str, state: JobState) -> JobEvent {
        JobEvent { identity: Identity::new(path).unwrap(), state }
    }

    #[tokio::test]
    async fn test_stream_ends_when_sender_dropped() {
        let (sender, receiver) = broadcast::channel(8);
        let events = stream(receiver);
        sender.send(event("/a.png", JobState::Queued)).unwrap();
        sender.send(event("/a.png", JobState::Running)).unwrap();
        drop(sender);

        let received: Vec<_> = events.collect().await;
        assert_eq!(received, vec![event("/a.png", JobState::Queued), event("/a.png", JobState::Running)]);
    }

    #[tokio::test]
    async fn test_stream_skips_lagged_events() {
        let (sender, receiver) = broadcast::channel(2);
        let events = stream(receiver);
        for path in ["/a.png", "/b.png", "/c.png", "/d.png"] {
            sender.send(event(path, JobState::Cancelled)).unwrap();
        }
        drop(sender);

        let received: Vec<_> = events.map(|event| event.identity.to_string()).collect().await;
        assert_eq!(received, vec!["/c.png", "/d.png"]);
    }
}

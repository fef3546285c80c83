use axum::response::sse::{Event, KeepAlive, Sse};
use cid_prober::ProgressSink;
use cid_protocol::ProgressEvent;
use futures::stream::{self, Stream, StreamExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

pub type SseStream = Sse<Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

const CHANNEL_CAPACITY: usize = 64;

struct Session {
    sender: broadcast::Sender<ProgressEvent>,
    /// Set once the session finished; replayed to anyone who subscribes late.
    last: Option<ProgressEvent>,
    running: bool,
}

impl Session {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            last: None,
            running: false,
        }
    }

    /// Opened by a subscriber that has since gone away, with no conversion attached.
    fn is_abandoned(&self) -> bool {
        !self.running && self.last.is_none() && self.sender.receiver_count() == 0
    }
}

/// Per-session progress channels, keyed by the client's session id.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
    retention: Duration,
}

impl SessionRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            retention,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// Marks a conversion as running under `session_id`. Returns `false`
    /// when one is already running or has finished under this id.
    pub fn open(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write();
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(Session::new);
        if session.running || session.last.is_some() {
            return false;
        }
        session.running = true;
        true
    }

    /// Events of the session from now on, ending after the terminal event.
    pub fn subscribe(&self, session_id: &str) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        let (receiver, last) = {
            let mut sessions = self.sessions.write();
            sessions.retain(|_, session| !session.is_abandoned());
            let session = sessions
                .entry(session_id.to_string())
                .or_insert_with(Session::new);
            (session.sender.subscribe(), session.last.clone())
        };

        if let Some(last) = last {
            return stream::iter(vec![last]).left_stream();
        }

        let state = (receiver, session_id.to_string(), false);
        stream::unfold(state, |(mut receiver, session_id, finished)| async move {
            if finished {
                return None;
            }
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        let finished = event.is_terminal();
                        return Some((event, (receiver, session_id, finished)));
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(session = %session_id, skipped, "Progress subscriber fell behind");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .right_stream()
    }

    pub fn publish(&self, session_id: &str, event: ProgressEvent) {
        let sessions = self.sessions.read();
        if let Some(session) = sessions.get(session_id) {
            // No receivers yet is fine; the terminal event is kept for them.
            let _ = session.sender.send(event);
        }
    }

    /// Publishes the terminal event and schedules the session for removal.
    pub fn finish(self: &Arc<Self>, session_id: &str, event: ProgressEvent) {
        {
            let mut sessions = self.sessions.write();
            let session = sessions
                .entry(session_id.to_string())
                .or_insert_with(Session::new);
            session.running = false;
            session.last = Some(event.clone());
            let _ = session.sender.send(event);
        }

        let registry = Arc::clone(self);
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(registry.retention).await;
            registry.sessions.write().remove(&session_id);
            debug!(session = %session_id, "Session expired");
        });
    }
}

/// Forwards chunk progress of one conversion to its session.
pub struct SessionProgress {
    registry: Arc<SessionRegistry>,
    session_id: String,
}

impl SessionProgress {
    pub fn new(registry: Arc<SessionRegistry>, session_id: impl Into<String>) -> Self {
        Self {
            registry,
            session_id: session_id.into(),
        }
    }
}

impl ProgressSink for SessionProgress {
    fn chunk_settled(&self, settled: usize, total: usize) {
        self.registry
            .publish(&self.session_id, ProgressEvent::progress(settled, total));
    }
}

/// Unnamed events so browser `onmessage` handlers receive them.
pub fn progress_stream<S>(events: S, keepalive: Duration) -> SseStream
where
    S: Stream<Item = ProgressEvent> + Send + 'static,
{
    let stream = events.map(|event| {
        let data = event.to_json().unwrap_or_default();
        Ok(Event::default().data(data))
    });

    let boxed_stream: Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> = Box::pin(stream);
    Sse::new(boxed_stream).keep_alive(KeepAlive::new().interval(keepalive).text("keep-alive"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn test_subscriber_sees_progress_then_completion() {
        let registry = registry();
        let events = registry.subscribe("s1");

        registry.publish("s1", ProgressEvent::progress(8, 20));
        registry.publish("s1", ProgressEvent::progress(16, 20));
        registry.finish("s1", ProgressEvent::Error { message: "boom".to_string() });
        registry.publish("s1", ProgressEvent::progress(20, 20));

        let received: Vec<ProgressEvent> = events.collect().await;
        assert_eq!(received.len(), 3);
        assert!(received[2].is_terminal());
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_terminal_event() {
        let registry = registry();
        assert!(registry.open("s2"));
        registry.finish("s2", ProgressEvent::Error { message: "blocked".to_string() });

        let received: Vec<ProgressEvent> = registry.subscribe("s2").collect().await;
        assert_eq!(
            received,
            vec![ProgressEvent::Error { message: "blocked".to_string() }]
        );
        assert!(!registry.open("s2"));
    }

    #[tokio::test]
    async fn test_open_rejects_duplicate_session() {
        let registry = registry();
        let _events = registry.subscribe("s4");
        assert!(registry.open("s4"));
        assert!(!registry.open("s4"));
    }

    #[test]
    fn test_abandoned_subscriptions_pruned() {
        let registry = registry();
        drop(registry.subscribe("gone"));
        let _live = registry.subscribe("live");
        assert!(!registry.contains("gone"));
        assert!(registry.contains("live"));
    }

    #[tokio::test]
    async fn test_session_expires() {
        let registry = Arc::new(SessionRegistry::new(Duration::from_millis(20)));
        registry.open("s3");
        registry.finish("s3", ProgressEvent::Error { message: "x".to_string() });
        assert!(registry.contains("s3"));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(registry.is_empty());
    }

    #[test]
    fn test_progress_sink_ignores_unknown_session() {
        let sink = SessionProgress::new(registry(), "missing");
        sink.chunk_settled(1, 2);
    }
}

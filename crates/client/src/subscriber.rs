//! The client notification subscriber.
//!
//! Owns one logical transport connection, re-establishes it on failure, and
//! feeds every inbound event through normalisation into the notification
//! store. The transport itself is injected as a connect closure returning a
//! channel of raw events, so tests (and alternative transports) need no real
//! socket.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::normalize::{normalize, Notification};
use crate::store::NotificationStore;

const RECONNECT_DELAY: Duration = Duration::from_secs(3);

type Handler = Box<dyn Fn(&Notification) + Send + Sync>;

pub struct Subscriber {
    store: Arc<NotificationStore>,
    handlers: Mutex<Vec<Handler>>,
}

impl Subscriber {
    pub fn new(store: Arc<NotificationStore>) -> Self {
        Self {
            store,
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> Arc<NotificationStore> {
        self.store.clone()
    }

    /// Registers a handler invoked for every newly accepted notification.
    pub fn on_event(&self, handler: impl Fn(&Notification) + Send + Sync + 'static) {
        self.handlers().push(Box::new(handler));
    }

    /// Normalises one raw event and applies both store effects. Duplicates
    /// (same dedup id) are dropped without invoking handlers.
    pub fn ingest(&self, raw: &Value) {
        let notification = normalize(raw, chrono::Utc::now());
        if !self.store.push(notification.clone()) {
            tracing::debug!(id = %notification.id, "dropping duplicate notification");
            return;
        }
        for handler in self.handlers().iter() {
            handler(&notification);
        }
    }

    /// Runs the connection loop: connect with the identity token, drain the
    /// event stream, reconnect after a fixed delay when it fails or closes.
    ///
    /// Connection failures are logged, never panicked on; the loop runs until
    /// the owning task is dropped, and is safe to restart.
    pub async fn run<C, Fut, E>(&self, token: &str, connect: C)
    where
        C: Fn(String) -> Fut,
        Fut: Future<Output = Result<mpsc::Receiver<Value>, E>>,
        E: std::fmt::Display,
    {
        loop {
            match connect(token.to_string()).await {
                Ok(mut events) => {
                    tracing::info!("notification stream connected");
                    while let Some(raw) = events.recv().await {
                        self.ingest(&raw);
                    }
                    tracing::info!("notification stream closed, reconnecting");
                }
                Err(e) => {
                    tracing::warn!("notification stream connect failed: {e}");
                }
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    fn handlers(&self) -> std::sync::MutexGuard<'_, Vec<Handler>> {
        self.handlers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn subscriber() -> Subscriber {
        Subscriber::new(Arc::new(NotificationStore::new()))
    }

    #[test]
    fn test_ingest_updates_list_and_toast_and_handlers() {
        let subscriber = subscriber();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        subscriber.on_event(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        subscriber.ingest(&json!({
            "type": "consultation:responded",
            "message": "Dr Okafor accepted the consultation",
            "payload": {"consultation": {"id": "c-1"}}
        }));

        let store = subscriber.store();
        assert_eq!(store.unread_count(), 1);
        assert_eq!(store.current_toast().unwrap().id, "c-1");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_event_skips_handlers() {
        let subscriber = subscriber();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        subscriber.on_event(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let raw = json!({
            "type": "referral:accepted",
            "payload": {"referral": {"id": "r-7"}}
        });

        subscriber.ingest(&raw);
        subscriber.ingest(&raw);

        assert_eq!(subscriber.store().unread_count(), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_drains_stream_and_survives_connect_failure() {
        let subscriber = Arc::new(subscriber());
        let store = subscriber.store();
        let attempts = Arc::new(AtomicUsize::new(0));

        let task_subscriber = subscriber.clone();
        let task_attempts = attempts.clone();
        let task = tokio::spawn(async move {
            task_subscriber
                .run("tok-1", move |_token| {
                    let attempt = task_attempts.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt == 0 {
                            // First attempt fails; the loop must recover.
                            return Err("connection refused");
                        }
                        let (tx, rx) = mpsc::channel(4);
                        tx.send(json!({
                            "type": "report:created",
                            "payload": {"report": {"id": "rep-1"}}
                        }))
                        .await
                        .unwrap();
                        // Sender drops here, closing the stream after one event.
                        Ok(rx)
                    }
                })
                .await;
        });

        tokio::time::timeout(Duration::from_secs(10), async {
            while store.unread_count() == 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("event should arrive after reconnect");

        task.abort();
        assert!(attempts.load(Ordering::SeqCst) >= 2);
        assert_eq!(store.list()[0].id, "rep-1");
    }
}

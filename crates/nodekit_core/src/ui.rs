//! UI event queue
//!
//! The UI is a single consumer draining a bounded channel. Anything that
//! wants to touch UI state (runtime callbacks, worker threads, network
//! probes) posts an event through a [`UiHandle`] instead.
//!
//! ```ignore
//! let (ui, mut ui_loop) = ui::channel::<Event>(64, Backpressure::Block);
//! let counter = ui.callback(Event::Counter);
//! std::thread::spawn(move || counter.invoke(1));
//! ui_loop.run(|event| state.apply(event)).await;
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// What a producer does when the UI queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backpressure {
    /// Producer waits until the consumer frees a slot.
    #[default]
    Block,
    /// The new value is discarded and counted.
    DropNewest,
}

/// Result of posting a single event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    Dropped,
    /// The consumer is gone.
    Closed,
}

#[derive(Debug, Default)]
struct DeliveryStats {
    queued: AtomicU64,
    dropped: AtomicU64,
}

/// Create a UI queue with room for `capacity` pending events.
pub fn channel<E>(capacity: usize, policy: Backpressure) -> (UiHandle<E>, UiLoop<E>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let stats = Arc::new(DeliveryStats::default());
    (
        UiHandle {
            tx,
            policy,
            stats: stats.clone(),
        },
        UiLoop { rx, stats },
    )
}

/// Producer side of the UI queue. Cheap to clone and safe to move to any thread.
pub struct UiHandle<E> {
    tx: mpsc::Sender<E>,
    policy: Backpressure,
    stats: Arc<DeliveryStats>,
}

impl<E> Clone for UiHandle<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            policy: self.policy,
            stats: self.stats.clone(),
        }
    }
}

impl<E: Send + 'static> UiHandle<E> {
    /// Post one event to the UI queue.
    ///
    /// With [`Backpressure::Block`] a producer outside the async runtime waits
    /// for space. Inside the runtime waiting would stall the UI itself, so a
    /// full queue drops the event there as well.
    pub fn post(&self, event: E) -> Delivery {
        let blocking = self.policy == Backpressure::Block
            && tokio::runtime::Handle::try_current().is_err();

        let delivery = if blocking {
            match self.tx.blocking_send(event) {
                Ok(()) => Delivery::Queued,
                Err(_) => Delivery::Closed,
            }
        } else {
            match self.tx.try_send(event) {
                Ok(()) => Delivery::Queued,
                Err(mpsc::error::TrySendError::Full(_)) => Delivery::Dropped,
                Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
            }
        };

        match delivery {
            Delivery::Queued => {
                self.stats.queued.fetch_add(1, Ordering::Relaxed);
            }
            Delivery::Dropped => {
                let dropped = self.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(dropped, "UI queue full, event dropped");
            }
            Delivery::Closed => {
                tracing::debug!("UI queue closed, event discarded");
            }
        }
        delivery
    }

    /// Build a callback that marshals every value onto the UI queue.
    pub fn callback<T, F>(&self, map: F) -> CallbackHandle<T>
    where
        T: 'static,
        F: Fn(T) -> E + Send + Sync + 'static,
    {
        let ui = self.clone();
        CallbackHandle::new(move |value| ui.post(map(value)))
    }

    pub fn policy(&self) -> Backpressure {
        self.policy
    }

    /// Number of events dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }
}

/// Opaque sink handed to the runtime. Invoked zero or more times, from any thread.
pub struct CallbackHandle<T> {
    sink: Arc<dyn Fn(T) -> Delivery + Send + Sync>,
}

impl<T> Clone for CallbackHandle<T> {
    fn clone(&self) -> Self {
        Self {
            sink: self.sink.clone(),
        }
    }
}

impl<T> fmt::Debug for CallbackHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHandle").finish_non_exhaustive()
    }
}

impl<T> CallbackHandle<T> {
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(T) -> Delivery + Send + Sync + 'static,
    {
        Self {
            sink: Arc::new(sink),
        }
    }

    pub fn invoke(&self, value: T) -> Delivery {
        (self.sink)(value)
    }
}

/// Consumer side of the UI queue. Owned by the UI thread.
pub struct UiLoop<E> {
    rx: mpsc::Receiver<E>,
    stats: Arc<DeliveryStats>,
}

impl<E> UiLoop<E> {
    pub async fn recv(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    /// Blocking receive for consumers that live outside the async runtime.
    pub fn blocking_recv(&mut self) -> Option<E> {
        self.rx.blocking_recv()
    }

    /// Apply every event in arrival order until all producers are dropped.
    pub async fn run<F>(&mut self, mut apply: F)
    where
        F: FnMut(E),
    {
        while let Some(event) = self.rx.recv().await {
            apply(event);
        }
        tracing::debug!("UI queue drained, all producers gone");
    }

    /// Take whatever is queued right now without waiting.
    pub fn try_drain(&mut self) -> Vec<E> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Total events accepted by the queue so far.
    pub fn queued(&self) -> u64 {
        self.stats.queued.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.stats.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Debug, PartialEq)]
    enum Event {
        Counter(i32),
        Toast(String),
    }

    #[test]
    fn test_callback_values_arrive_in_emission_order() {
        let (ui, mut ui_loop) = channel::<Event>(4, Backpressure::Block);
        let counter = ui.callback(Event::Counter);
        drop(ui);

        let producer = thread::spawn(move || {
            for i in 1..=100 {
                assert_eq!(counter.invoke(i), Delivery::Queued);
            }
        });

        let mut seen = Vec::new();
        while let Some(Event::Counter(value)) = ui_loop.blocking_recv() {
            seen.push(value);
        }
        producer.join().unwrap();

        assert_eq!(seen, (1..=100).collect::<Vec<_>>());
        assert_eq!(ui_loop.queued(), 100);
        assert_eq!(ui_loop.dropped(), 0);
    }

    #[test]
    fn test_drop_newest_counts_overflow() {
        let (ui, mut ui_loop) = channel::<Event>(2, Backpressure::DropNewest);
        let counter = ui.callback(Event::Counter);

        assert_eq!(counter.invoke(1), Delivery::Queued);
        assert_eq!(counter.invoke(2), Delivery::Queued);
        assert_eq!(counter.invoke(3), Delivery::Dropped);

        assert_eq!(ui.dropped(), 1);
        assert_eq!(
            ui_loop.try_drain(),
            vec![Event::Counter(1), Event::Counter(2)]
        );
    }

    #[test]
    fn test_post_after_consumer_gone_reports_closed() {
        let (ui, ui_loop) = channel::<Event>(1, Backpressure::Block);
        drop(ui_loop);
        assert_eq!(ui.post(Event::Toast("late".into())), Delivery::Closed);
    }

    #[tokio::test]
    async fn test_run_applies_events_until_producers_drop() {
        let (ui, mut ui_loop) = channel::<Event>(8, Backpressure::Block);
        let toast = ui.callback(|msg: &str| Event::Toast(msg.to_string()));
        drop(ui);

        thread::spawn(move || {
            toast.invoke("hello");
            toast.invoke("world");
        });

        let mut toasts = Vec::new();
        ui_loop
            .run(|event| {
                if let Event::Toast(msg) = event {
                    toasts.push(msg);
                }
            })
            .await;

        assert_eq!(toasts, vec!["hello".to_string(), "world".to_string()]);
    }

    #[test]
    fn test_backpressure_deserializes_snake_case() {
        let policy: Backpressure = serde_json::from_str("\"drop_newest\"").unwrap();
        assert_eq!(policy, Backpressure::DropNewest);
    }
}

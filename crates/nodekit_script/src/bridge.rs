//! Native runtime bridge
//!
//! The host only ever talks to the embedded runtime through
//! [`NativeRuntime`]. [`RuntimeBridge`] adds the start-once guarantee on top.

use nodekit_core::CallbackHandle;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Entry points of an embedded JavaScript runtime.
///
/// Callbacks may be invoked from any thread, any number of times.
pub trait NativeRuntime: Send + Sync {
    /// Run the runtime with a node-style command line. Blocks until the
    /// entry script finishes and returns its exit status.
    fn start(&self, args: &[String]) -> i32;

    /// Register the string (toast) callback.
    fn init(&self, callback: CallbackHandle<String>);

    /// Tear down. Must be idempotent and safe before `init`.
    fn release(&self);

    /// Start a background computation reporting integers to `callback`.
    fn async_computation(&self, callback: CallbackHandle<i32>);

    /// A greeting produced natively, used to check UTF-8 round-tripping.
    fn utf8_string(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StartState {
    NotStarted = 0,
    Starting = 1,
    Started = 2,
}

impl StartState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => StartState::NotStarted,
            1 => StartState::Starting,
            _ => StartState::Started,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// This call started the runtime; it has since exited with `status`.
    Ran { status: i32 },
    /// Another call is running the runtime right now.
    AlreadyStarting,
    AlreadyStarted,
}

pub struct RuntimeBridge<R> {
    runtime: R,
    state: AtomicU8,
    initialized: AtomicBool,
}

impl<R: NativeRuntime> RuntimeBridge<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            state: AtomicU8::new(StartState::NotStarted as u8),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn state(&self) -> StartState {
        StartState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Start the runtime unless some call already did.
    ///
    /// Only the caller that wins the `NotStarted -> Starting` transition
    /// reaches the native start, so concurrent callers cannot double-start.
    /// The native status code is logged and returned, never acted on.
    pub fn start(&self, args: &[String]) -> StartOutcome {
        if let Err(outcome) = self.try_claim() {
            return outcome;
        }
        let status = self.run_native(args);
        self.state.store(StartState::Started as u8, Ordering::Release);
        StartOutcome::Ran { status }
    }

    /// Take the `NotStarted -> Starting` transition now and start later,
    /// possibly on another thread. Work done before [`StartClaim::run`]
    /// is covered by the same start-once guarantee.
    pub fn claim(self: &Arc<Self>) -> Result<StartClaim<R>, StartOutcome> {
        self.try_claim()?;
        Ok(StartClaim {
            bridge: self.clone(),
            began: false,
        })
    }

    fn try_claim(&self) -> Result<(), StartOutcome> {
        match self.state.compare_exchange(
            StartState::NotStarted as u8,
            StartState::Starting as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(current) => {
                let outcome = match StartState::from_u8(current) {
                    StartState::Starting => StartOutcome::AlreadyStarting,
                    _ => StartOutcome::AlreadyStarted,
                };
                tracing::debug!(?outcome, "Runtime start skipped");
                Err(outcome)
            }
        }
    }

    fn run_native(&self, args: &[String]) -> i32 {
        tracing::info!(?args, "Starting runtime");
        let status = self.runtime.start(args);
        tracing::info!(status, "Runtime exited");
        status
    }

    pub fn init(&self, callback: CallbackHandle<String>) {
        self.runtime.init(callback);
        self.initialized.store(true, Ordering::Release);
    }

    pub fn async_computation(&self, callback: CallbackHandle<i32>) {
        self.runtime.async_computation(callback);
    }

    pub fn utf8_string(&self) -> String {
        self.runtime.utf8_string()
    }

    /// Tear down the runtime. Safe whether or not `init` ever ran.
    pub fn release(&self) {
        let was_initialized = self.initialized.swap(false, Ordering::AcqRel);
        tracing::info!(was_initialized, "Releasing runtime");
        self.runtime.release();
    }
}

/// Exclusive right to start the runtime, from [`RuntimeBridge::claim`].
///
/// Dropping the claim without running it hands the start back, so a later
/// caller may try again.
pub struct StartClaim<R: NativeRuntime> {
    bridge: Arc<RuntimeBridge<R>>,
    began: bool,
}

impl<R: NativeRuntime> StartClaim<R> {
    pub fn run(mut self, args: &[String]) -> StartOutcome {
        self.began = true;
        let status = self.bridge.run_native(args);
        StartOutcome::Ran { status }
    }
}

impl<R: NativeRuntime> Drop for StartClaim<R> {
    fn drop(&mut self) {
        let next = if self.began {
            StartState::Started
        } else {
            tracing::warn!("Runtime start abandoned before it ran");
            StartState::NotStarted
        };
        self.bridge.state.store(next as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodekit_core::Delivery;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Barrier, Mutex};
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeRuntime {
        starts: AtomicUsize,
        releases: AtomicUsize,
        toast: Mutex<Option<CallbackHandle<String>>>,
    }

    impl NativeRuntime for FakeRuntime {
        fn start(&self, _args: &[String]) -> i32 {
            self.starts.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            if let Some(toast) = self.toast.lock().unwrap().as_ref() {
                toast.invoke("started".to_string());
            }
            0
        }

        fn init(&self, callback: CallbackHandle<String>) {
            *self.toast.lock().unwrap() = Some(callback);
        }

        fn release(&self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
            self.toast.lock().unwrap().take();
        }

        fn async_computation(&self, callback: CallbackHandle<i32>) {
            thread::spawn(move || {
                for i in 1..=3 {
                    callback.invoke(i);
                }
            });
        }

        fn utf8_string(&self) -> String {
            "héllo".to_string()
        }
    }

    fn args() -> Vec<String> {
        vec!["node".to_string(), "main.js".to_string()]
    }

    #[test]
    fn test_sequential_starts_call_native_once() {
        let bridge = RuntimeBridge::new(FakeRuntime::default());
        assert_eq!(bridge.state(), StartState::NotStarted);

        assert_eq!(bridge.start(&args()), StartOutcome::Ran { status: 0 });
        assert_eq!(bridge.start(&args()), StartOutcome::AlreadyStarted);

        assert_eq!(bridge.runtime().starts.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.state(), StartState::Started);
    }

    #[test]
    fn test_concurrent_starts_call_native_once() {
        let bridge = Arc::new(RuntimeBridge::new(FakeRuntime::default()));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bridge = bridge.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    bridge.start(&args())
                })
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let ran = outcomes
            .iter()
            .filter(|o| matches!(o, StartOutcome::Ran { .. }))
            .count();
        assert_eq!(ran, 1);
        assert_eq!(bridge.runtime().starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_without_init_is_safe_and_repeatable() {
        let bridge = RuntimeBridge::new(FakeRuntime::default());
        bridge.release();
        bridge.release();
        assert_eq!(bridge.runtime().releases.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_callbacks_flow_through_bridge() {
        let bridge = RuntimeBridge::new(FakeRuntime::default());
        let toasts = Arc::new(Mutex::new(Vec::new()));
        let sink = toasts.clone();
        bridge.init(CallbackHandle::new(move |msg: String| {
            sink.lock().unwrap().push(msg);
            Delivery::Queued
        }));

        bridge.start(&args());
        assert_eq!(*toasts.lock().unwrap(), vec!["started"]);
        assert_eq!(bridge.utf8_string(), "héllo");

        bridge.release();
        assert!(bridge.runtime().toast.lock().unwrap().is_none());
    }

    #[test]
    fn test_claim_holds_start_until_run() {
        let bridge = Arc::new(RuntimeBridge::new(FakeRuntime::default()));

        let claim = bridge.claim().unwrap();
        assert_eq!(bridge.state(), StartState::Starting);
        assert!(matches!(bridge.claim(), Err(StartOutcome::AlreadyStarting)));
        assert_eq!(bridge.start(&args()), StartOutcome::AlreadyStarting);

        let runner = thread::spawn(move || claim.run(&args()));
        assert_eq!(runner.join().unwrap(), StartOutcome::Ran { status: 0 });

        assert_eq!(bridge.state(), StartState::Started);
        assert!(matches!(bridge.claim(), Err(StartOutcome::AlreadyStarted)));
        assert_eq!(bridge.runtime().starts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_claim_hands_start_back() {
        let bridge = Arc::new(RuntimeBridge::new(FakeRuntime::default()));
        drop(bridge.claim().unwrap());
        assert_eq!(bridge.state(), StartState::NotStarted);

        assert_eq!(bridge.start(&args()), StartOutcome::Ran { status: 0 });
        assert_eq!(bridge.runtime().starts.load(Ordering::SeqCst), 1);
    }
}

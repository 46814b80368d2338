//! Embedded node-style runtime backed by QuickJS
//!
//! Implements [`NativeRuntime`] in-process. `start` owns its QuickJS
//! runtime on the calling thread until the entry script, its Promise jobs
//! and its timers are done.

use crate::bridge::NativeRuntime;
use crate::error::{Result, ScriptError};
use crate::ffi::{self, CallbackSlot, Timers};
use nodekit_core::{CallbackHandle, Delivery};
use rquickjs::{CatchResultExt, Context, Ctx, Runtime};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// Node's exit code for a bad command line.
pub const EXIT_INVALID_ARGS: i32 = 9;
/// Node's exit code for an uncaught exception.
pub const EXIT_UNCAUGHT: i32 = 1;

#[derive(Debug, Clone)]
pub struct EmbeddedConfig {
    pub tick_interval: Duration,
    pub tick_limit: Option<u32>,
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            tick_limit: None,
        }
    }
}

#[derive(Default)]
struct Shared {
    released: AtomicBool,
    gate: Mutex<()>,
    wake: Condvar,
}

impl Shared {
    fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Sleep for `timeout` or until released. `true` if released.
    fn wait_released(&self, timeout: Duration) -> bool {
        let guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = self
            .wake
            .wait_timeout_while(guard, timeout, |_| !self.is_released())
            .unwrap_or_else(PoisonError::into_inner);
        self.is_released()
    }

    fn release(&self) {
        let _guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.released.store(true, Ordering::Release);
        self.wake.notify_all();
    }
}

pub struct EmbeddedNode {
    config: EmbeddedConfig,
    toast: CallbackSlot<String>,
    shared: Arc<Shared>,
}

impl EmbeddedNode {
    pub fn new(config: EmbeddedConfig) -> Self {
        Self {
            config,
            toast: CallbackSlot::default(),
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn is_released(&self) -> bool {
        self.shared.is_released()
    }

    fn run_entry(&self, args: &[String]) -> Result<()> {
        if self.shared.is_released() {
            return Err(ScriptError::Released);
        }

        let entry = Path::new(&args[1]);
        let source = std::fs::read_to_string(entry).map_err(|source| ScriptError::Io {
            path: entry.to_path_buf(),
            source,
        })?;

        let runtime = Runtime::new()?;
        let shared = self.shared.clone();
        runtime.set_interrupt_handler(Some(Box::new(move || shared.is_released())));
        let context = Context::full(&runtime)?;

        context.with(|ctx| {
            ffi::install_host(&ctx)?;
            ffi::install_toast(&ctx, self.toast.clone())?;
            ffi::install_process(&ctx, args)?;
            let timers = ffi::install_timers(&ctx)?;
            ctx.eval::<(), _>(source)
                .catch(&ctx)
                .map_err(|err| self.script_error(err.to_string()))?;
            self.run_event_loop(&ctx, &timers)
        })
    }

    /// Run jobs and timers until neither is left. A release ends the loop
    /// with [`ScriptError::Released`].
    fn run_event_loop(&self, ctx: &Ctx<'_>, timers: &Timers<'_>) -> Result<()> {
        loop {
            while ctx.execute_pending_job() {
                if self.shared.is_released() {
                    return Err(ScriptError::Released);
                }
            }

            let Some(wait) = timers.next_due()? else {
                return Ok(());
            };
            if !wait.is_zero() && self.shared.wait_released(wait) {
                return Err(ScriptError::Released);
            }
            timers
                .fire_due()
                .catch(ctx)
                .map_err(|err| self.script_error(err.to_string()))?;
        }
    }

    /// Interrupts caused by a release surface as exceptions; report them as
    /// the release.
    fn script_error(&self, message: String) -> ScriptError {
        if self.shared.is_released() {
            ScriptError::Released
        } else {
            ScriptError::Exception(message)
        }
    }
}

impl Default for EmbeddedNode {
    fn default() -> Self {
        Self::new(EmbeddedConfig::default())
    }
}

impl NativeRuntime for EmbeddedNode {
    fn start(&self, args: &[String]) -> i32 {
        if args.len() < 2 {
            tracing::error!(?args, "Expected `node <script>`");
            return EXIT_INVALID_ARGS;
        }

        match self.run_entry(args) {
            Ok(()) => 0,
            Err(ScriptError::Released) => {
                tracing::info!(entry = %args[1], "Entry script stopped by release");
                EXIT_UNCAUGHT
            }
            Err(err) => {
                tracing::error!(%err, entry = %args[1], "Entry script failed");
                EXIT_UNCAUGHT
            }
        }
    }

    fn init(&self, callback: CallbackHandle<String>) {
        self.toast.set(callback);
    }

    fn release(&self) {
        self.shared.release();
        self.toast.clear();
    }

    fn async_computation(&self, callback: CallbackHandle<i32>) {
        let shared = self.shared.clone();
        let interval = self.config.tick_interval;
        let limit = self.config.tick_limit;

        let spawned = thread::Builder::new()
            .name("nodekit-ticker".to_string())
            .spawn(move || {
                let mut value: i32 = 0;
                while !shared.is_released() {
                    value += 1;
                    if callback.invoke(value) == Delivery::Closed {
                        break;
                    }
                    if limit.is_some_and(|limit| value as u32 >= limit) {
                        break;
                    }
                    if shared.wait_released(interval) {
                        break;
                    }
                }
                tracing::debug!(last = value, "Ticker stopped");
            });

        if let Err(err) = spawned {
            tracing::error!(%err, "Cannot spawn ticker thread");
        }
    }

    fn utf8_string(&self) -> String {
        "Hello from QuickJS: こんにちは, привет, 👋".to_string()
    }
}

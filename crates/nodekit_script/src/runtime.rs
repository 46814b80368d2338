//! Script runtime management
//!
//! A standalone JavaScript context for ad-hoc evaluation from host code.
//! Results are copied out as owned values; Promises stay in the context and
//! are resolved on demand by driving the job queue.

use crate::error::{Result, ScriptError};
use crate::ffi;
use nodekit_core::CallbackHandle;
use rquickjs::{
    CatchResultExt, CaughtError, Context, Function, Persistent, Promise, Runtime, Value,
};
use serde::Serialize;
use std::cell::Cell;
use std::fmt;
use std::path::Path;

/// Owned outcome of [`ScriptRuntime::eval`].
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    Value(serde_json::Value),
    Promise(PendingPromise),
}

/// A Promise still owned by the context that created it.
///
/// Must be resolved or dropped before its [`ScriptRuntime`].
#[derive(Clone, PartialEq)]
pub struct PendingPromise {
    id: u64,
    promise: Persistent<Promise<'static>>,
}

impl PendingPromise {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for PendingPromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingPromise").field("id", &self.id).finish()
    }
}

impl EvalResult {
    pub fn value(&self) -> Option<&serde_json::Value> {
        match self {
            EvalResult::Value(value) => Some(value),
            EvalResult::Promise(_) => None,
        }
    }

    /// The result as an `i32`, truncating fractional numbers.
    pub fn to_integer(&self) -> Result<i32> {
        self.value()
            .and_then(number_to_i32)
            .ok_or(ScriptError::NotANumber)
    }

    pub fn to_integer_array(&self) -> Result<Vec<i32>> {
        let items = self
            .value()
            .and_then(serde_json::Value::as_array)
            .ok_or(ScriptError::NotAnArray)?;
        items
            .iter()
            .map(|item| number_to_i32(item).ok_or(ScriptError::NotANumber))
            .collect()
    }

    /// String form: strings as-is, everything else as JSON.
    pub fn to_js_string(&self) -> String {
        match self {
            EvalResult::Value(serde_json::Value::String(s)) => s.clone(),
            EvalResult::Value(value) => value.to_string(),
            EvalResult::Promise(_) => "[object Promise]".to_string(),
        }
    }

    pub fn into_promise(self) -> Result<PendingPromise> {
        match self {
            EvalResult::Promise(promise) => Ok(promise),
            EvalResult::Value(_) => Err(ScriptError::NotAPromise),
        }
    }
}

fn number_to_i32(value: &serde_json::Value) -> Option<i32> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .map(|i| i as i32)
}

/// Script execution context
pub struct ScriptRuntime {
    runtime: Runtime,
    pub context: Context,
    promises: Cell<u64>,
}

impl ScriptRuntime {
    pub fn new() -> Result<Self> {
        let runtime = Runtime::new()?;
        let context = Context::full(&runtime)?;
        context.with(|ctx| ffi::install_host(&ctx))?;

        Ok(Self {
            runtime,
            context,
            promises: Cell::new(0),
        })
    }

    pub fn execute_file(&self, path: &Path) -> Result<()> {
        let source = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.execute(&source)
    }

    pub fn execute(&self, source: &str) -> Result<()> {
        self.context.with(|ctx| {
            ctx.eval::<(), _>(source)
                .catch(&ctx)
                .map_err(|err| ScriptError::Exception(err.to_string()))
        })
    }

    /// Call a JavaScript function by name with no arguments.
    pub fn call_function(&self, name: &str) -> Result<()> {
        self.context.with(|ctx| {
            let func: Function = ctx.globals().get(name)?;
            func.call::<_, ()>(())
                .catch(&ctx)
                .map_err(|err| ScriptError::Exception(err.to_string()))
        })
    }

    /// Bind a global to any serializable value, e.g. an integer list.
    pub fn set<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let json = serde_json::to_value(value)?;
        self.context.with(|ctx| {
            let value = ffi::json_to_js(&ctx, &json)?;
            ctx.globals().set(name, value)?;
            Ok(())
        })
    }

    /// Evaluate `source` and copy out its completion value.
    pub fn eval(&self, source: &str) -> Result<EvalResult> {
        self.context.with(|ctx| {
            let value: Value = ctx
                .eval(source)
                .catch(&ctx)
                .map_err(|err| ScriptError::Exception(err.to_string()))?;

            if let Some(promise) = value.as_promise() {
                let id = self.promises.get() + 1;
                self.promises.set(id);
                return Ok(EvalResult::Promise(PendingPromise {
                    id,
                    promise: Persistent::save(&ctx, promise.clone()),
                }));
            }

            Ok(EvalResult::Value(ffi::js_to_json(&value)?))
        })
    }

    /// Run queued jobs (Promise reactions) until none are left.
    pub fn run_pending_jobs(&self) -> Result<usize> {
        let mut ran = 0;
        while self.runtime.is_job_pending() {
            match self.runtime.execute_pending_job() {
                Ok(true) => ran += 1,
                Ok(false) => break,
                Err(_) => return Err(ScriptError::Job),
            }
        }
        Ok(ran)
    }

    /// Drive the job queue until `promise` settles.
    pub fn resolve(&self, promise: PendingPromise) -> Result<EvalResult> {
        let PendingPromise { id, promise } = promise;
        self.context.with(|ctx| {
            let promise = promise.restore(&ctx)?;
            match promise.finish::<Value>().catch(&ctx) {
                Ok(value) => Ok(EvalResult::Value(ffi::js_to_json(&value)?)),
                Err(CaughtError::Error(rquickjs::Error::WouldBlock)) => {
                    Err(ScriptError::Stalled(id))
                }
                Err(reason) => Err(ScriptError::Rejected(reason.to_string())),
            }
        })
    }

    /// Resolve `promise` and hand the outcome to `callback`.
    pub fn then(&self, promise: PendingPromise, callback: &CallbackHandle<Result<EvalResult>>) {
        let id = promise.id;
        let outcome = self.resolve(promise);
        if let Err(err) = &outcome {
            tracing::warn!(promise = id, %err, "Promise did not fulfil");
        }
        callback.invoke(outcome);
    }
}

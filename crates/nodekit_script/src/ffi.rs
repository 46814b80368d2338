//! FFI layer between Rust and scripts
//!
//! Host globals installed into every context, plus value conversion in both
//! directions. Conversion goes through `serde_json::Value`, so results
//! outlive the context that produced them.
//!
//! Each JS prelude evaluates to a function taking its Rust hooks as
//! arguments, so no helper globals are left for scripts to clobber.

use nodekit_core::CallbackHandle;
use rquickjs::{Array, Ctx, Exception, Function, IntoJs, Object, Value};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

const PRELUDE: &str = r#"
(hostLog, hostSleep) => {
  const format = (value) => {
    if (typeof value === 'string') return value;
    if (value instanceof Error) return String(value);
    const json = JSON.stringify(value);
    return json === undefined ? String(value) : json;
  };
  const print = (level) => (...args) => hostLog(level, args.map(format).join(' '));
  globalThis.console = {
    log: print('info'),
    info: print('info'),
    debug: print('debug'),
    warn: print('warn'),
    error: print('error'),
  };
  globalThis.$log = (value) => hostLog('info', format(value));
  globalThis.sleep = (ms, value) => {
    hostSleep(ms);
    return value;
  };
}
"#;

const PROCESS: &str = r#"
(argv, version) => {
  class JavaObject {
    constructor(value) { this.value = value; }
    plusOne() { return ++this.value; }
  }
  const bindings = {
    java: { createObject: (value) => new JavaObject(value) },
  };
  globalThis.process = {
    argv,
    versions: { nodekit: version, engine: 'quickjs' },
    binding: (name) => {
      const binding = bindings[name];
      if (binding === undefined) throw new Error(`No such module: ${name}`);
      return binding;
    },
  };
}
"#;

/// Node-style timers. Callbacks stay on the JS side; the host only asks
/// how long to wait and when to fire.
const TIMERS: &str = r#"
(() => {
  // Out-of-range delays run after 1ms, as in node.
  const TIMEOUT_MAX = 2 ** 31 - 1;
  const timers = new Map();
  let nextId = 1;

  const add = (callback, delay, args, repeat) => {
    if (typeof callback !== 'function') {
      throw new TypeError('The "callback" argument must be a function');
    }
    let ms = Number(delay);
    if (!(ms >= 1 && ms <= TIMEOUT_MAX)) ms = 1;
    const id = nextId++;
    timers.set(id, { callback, args, repeat, ms, due: Date.now() + ms });
    return id;
  };
  const clear = (id) => { timers.delete(Number(id)); };

  globalThis.setTimeout = (callback, delay, ...args) => add(callback, delay, args, false);
  globalThis.setInterval = (callback, delay, ...args) => add(callback, delay, args, true);
  globalThis.clearTimeout = clear;
  globalThis.clearInterval = clear;

  const earliest = () => {
    let found;
    for (const [id, timer] of timers) {
      if (found === undefined || timer.due < found[1].due) found = [id, timer];
    }
    return found;
  };

  return {
    next: () => {
      const found = earliest();
      return found === undefined ? -1 : Math.max(0, found[1].due - Date.now());
    },
    fire: () => {
      const found = earliest();
      if (found === undefined || found[1].due > Date.now()) return false;
      const [id, timer] = found;
      if (timer.repeat) timer.due = Date.now() + timer.ms;
      else timers.delete(id);
      timer.callback(...timer.args);
      return true;
    },
  };
})()
"#;

/// Registration slot for a runtime callback. Empty until the host registers one.
pub struct CallbackSlot<T> {
    inner: Arc<Mutex<Option<CallbackHandle<T>>>>,
}

impl<T> Clone for CallbackSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for CallbackSlot<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T> CallbackSlot<T> {
    pub fn set(&self, handle: CallbackHandle<T>) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    pub fn is_set(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Hand `value` to the registered callback. `false` if none is registered.
    pub fn deliver(&self, value: T) -> bool {
        // Clone out so the lock is not held while the callback blocks.
        let handle = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match handle {
            Some(handle) => {
                handle.invoke(value);
                true
            }
            None => false,
        }
    }
}

fn host_log(level: String, msg: String) {
    match level.as_str() {
        "error" => tracing::error!(target: "nodekit::js", "{}", msg),
        "warn" => tracing::warn!(target: "nodekit::js", "{}", msg),
        "debug" => tracing::debug!(target: "nodekit::js", "{}", msg),
        _ => tracing::info!(target: "nodekit::js", "{}", msg),
    }
}

/// Blocking sleep. Non-positive and NaN delays return at once; delays too
/// large for a `Duration` throw a `RangeError`.
fn host_sleep<'js>(ctx: Ctx<'js>, ms: f64) -> rquickjs::Result<()> {
    if ms.is_nan() || ms <= 0.0 {
        return Ok(());
    }
    match Duration::try_from_secs_f64(ms / 1000.0) {
        Ok(delay) => {
            std::thread::sleep(delay);
            Ok(())
        }
        Err(_) => Err(Exception::throw_range(
            &ctx,
            &format!("sleep: {ms}ms is out of range"),
        )),
    }
}

/// Install `console`, `$log` and `sleep`.
pub fn install_host(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let log_fn = Function::new(ctx.clone(), host_log)?;
    let sleep_fn = Function::new(ctx.clone(), host_sleep)?;

    let prelude: Function = ctx.eval(PRELUDE)?;
    prelude.call((log_fn, sleep_fn))
}

/// Install `$toast`, forwarding every message to `slot`.
pub fn install_toast(ctx: &Ctx<'_>, slot: CallbackSlot<String>) -> rquickjs::Result<()> {
    let toast_fn = Function::new(ctx.clone(), move |msg: String| {
        if !slot.deliver(msg.clone()) {
            tracing::warn!(%msg, "$toast called before a toast callback was registered");
        }
        msg
    })?;
    ctx.globals().set("$toast", toast_fn)
}

/// Install the `process` global for an entry script started with `argv`.
pub fn install_process(ctx: &Ctx<'_>, argv: &[String]) -> rquickjs::Result<()> {
    let install: Function = ctx.eval(PROCESS)?;
    install.call((argv.to_vec(), nodekit_core::VERSION))
}

/// Host side of the timer table installed by [`install_timers`].
pub struct Timers<'js> {
    next: Function<'js>,
    fire: Function<'js>,
}

impl<'js> Timers<'js> {
    /// Time until the earliest timer is due. `None` when no timer is left.
    pub fn next_due(&self) -> rquickjs::Result<Option<Duration>> {
        let wait: f64 = self.next.call(())?;
        if wait < 0.0 {
            return Ok(None);
        }
        Ok(Some(Duration::from_millis(wait.ceil() as u64)))
    }

    /// Run the earliest timer if it is due. `true` if one ran.
    pub fn fire_due(&self) -> rquickjs::Result<bool> {
        self.fire.call(())
    }
}

/// Install `setTimeout`, `setInterval`, `clearTimeout` and `clearInterval`.
pub fn install_timers<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Timers<'js>> {
    let handle: Object = ctx.eval(TIMERS)?;
    Ok(Timers {
        next: handle.get("next")?,
        fire: handle.get("fire")?,
    })
}

/// Convert a `serde_json::Value` into a JS value.
pub fn json_to_js<'js>(ctx: &Ctx<'js>, value: &serde_json::Value) -> rquickjs::Result<Value<'js>> {
    match value {
        serde_json::Value::Null => Ok(Value::new_null(ctx.clone())),
        serde_json::Value::Bool(b) => Ok(Value::new_bool(ctx.clone(), *b)),
        serde_json::Value::Number(n) => match n.as_i64().and_then(|i| i32::try_from(i).ok()) {
            Some(i) => Ok(Value::new_int(ctx.clone(), i)),
            None => Ok(Value::new_float(ctx.clone(), n.as_f64().unwrap_or(f64::NAN))),
        },
        serde_json::Value::String(s) => s.as_str().into_js(ctx),
        serde_json::Value::Array(items) => {
            let array = Array::new(ctx.clone())?;
            for (i, item) in items.iter().enumerate() {
                array.set(i, json_to_js(ctx, item)?)?;
            }
            Ok(array.into_value())
        }
        serde_json::Value::Object(map) => {
            let object = Object::new(ctx.clone())?;
            for (key, item) in map {
                object.set(key.as_str(), json_to_js(ctx, item)?)?;
            }
            Ok(object.into_value())
        }
    }
}

/// Convert a JS value into a `serde_json::Value`. Functions, symbols and
/// `undefined` become `null`.
pub fn js_to_json(value: &Value<'_>) -> rquickjs::Result<serde_json::Value> {
    if value.is_null() || value.is_undefined() || value.is_function() {
        return Ok(serde_json::Value::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(serde_json::Value::Bool(b));
    }
    if let Some(i) = value.as_int() {
        return Ok(serde_json::Value::from(i));
    }
    if let Some(f) = value.as_float() {
        return Ok(float_to_json(f));
    }
    if let Some(s) = value.as_string() {
        return Ok(serde_json::Value::String(s.to_string()?));
    }
    if let Some(array) = value.as_array() {
        let mut items = Vec::with_capacity(array.len());
        for i in 0..array.len() {
            let item: Value<'_> = array.get(i)?;
            items.push(js_to_json(&item)?);
        }
        return Ok(serde_json::Value::Array(items));
    }
    if let Some(object) = value.as_object() {
        let mut map = serde_json::Map::new();
        for prop in object.props::<String, Value<'_>>() {
            let (key, item) = prop?;
            map.insert(key, js_to_json(&item)?);
        }
        return Ok(serde_json::Value::Object(map));
    }
    Ok(serde_json::Value::Null)
}

/// QuickJS keeps many integral results (e.g. `Math.pow`) as doubles.
fn float_to_json(f: f64) -> serde_json::Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        serde_json::Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

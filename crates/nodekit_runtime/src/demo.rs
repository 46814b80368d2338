//! Snippets evaluated by the versions button.

use nodekit_script::{Result, ScriptRuntime};

pub const LIST: [i32; 6] = [11, 12, 13, 14, 15, 16];

const SQUARES: &str = "const double = i => Math.pow(i, 2); $doubleList = $list.map(double);";

const SUM: &str = "$doubleList.map(double).reduce((s, i) => s + i, 0)";

const MAX: &str = "async function delay(t, v) {\
                     return new Promise(resolve => { const r = sleep(t, v); resolve(r); });\
                   }\
                   const promises = $doubleList.map((num, index) => delay(index, num));\
                   const promise = (async function() {\
                     return Math.max(...(await Promise.all(promises)));\
                   })();\
                   (async function() { return await promise; })()";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versions {
    pub squares: Vec<i32>,
    pub sum: i32,
    pub max: i32,
}

/// Evaluate every snippet in a fresh context.
pub fn run() -> Result<Versions> {
    let runtime = ScriptRuntime::new()?;
    runtime.set("$list", &LIST)?;

    let squares = runtime.eval(SQUARES)?.to_integer_array()?;
    tracing::info!(?squares, "Squared list");

    let sum = runtime.eval(SUM)?.to_integer()?;
    tracing::info!(sum, "Sum of fourth powers");

    let promise = runtime.eval(MAX)?.into_promise()?;
    let max = runtime.resolve(promise)?.to_integer()?;
    tracing::info!(max, "Max value");

    Ok(Versions { squares, sum, max })
}

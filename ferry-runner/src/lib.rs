//! Ferry runner library
//!
//! Decoding, binding and invocation of flow targets. The `ferry-runner`
//! binary wires these to its command line; embedders can supply their own
//! [`Binder`].

pub mod binder;
pub mod invocation;
pub mod lua;

use serde_json::{Value as JsonValue, json};
use tracing::info;

pub use binder::{Binder, Invocable, StaticBinder};
pub use invocation::{Invocation, RunnerError};
pub use lua::LuaBinder;

/// Decode, bind and call a target
///
/// # Returns
/// The `{"result": ...}` document to print, or `None` when the target
/// returned nothing
pub fn run(
    target: &str,
    args: &str,
    kwargs: &str,
    binder: &dyn Binder,
) -> Result<Option<String>, RunnerError> {
    let invocation = Invocation::decode(target, args, kwargs)?;
    info!(
        "Running {} with {} positional and {} keyword argument(s)",
        invocation.target,
        invocation.args.len(),
        invocation.kwargs.len()
    );

    let invocable = binder.bind(&invocation.target)?;
    let result = invocable
        .invoke(&invocation.args, &invocation.kwargs)
        .map_err(|e| RunnerError::TargetFailed {
            target: invocation.target.canonical(),
            message: format!("{:#}", e),
        })?;

    info!("{} finished", invocation.target);
    if result == JsonValue::Null {
        return Ok(None);
    }
    serde_json::to_string(&json!({ "result": result }))
        .map(Some)
        .map_err(|e| RunnerError::TargetFailed {
            target: invocation.target.canonical(),
            message: format!("result is not serializable: {}", e),
        })
}

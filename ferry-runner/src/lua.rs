//! Lua script targets
//!
//! `pkg.mod:func` resolves to `<root>/pkg/mod.lua`. The module runs in a
//! restricted sandbox; `func` is looked up in the table the chunk returns,
//! then among its globals.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ferry_core::domain::target::TaskTarget;
use mlua::prelude::*;
use mlua::{LuaOptions, StdLib, Variadic};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, error, info, warn};

use crate::binder::{Binder, Invocable};
use crate::invocation::RunnerError;

/// Create a restricted Lua sandbox
///
/// Only tables, strings, math and coroutines are available; there is no I/O,
/// no OS access and no way to load further code. A `log` table forwards
/// messages to the runner's logger.
pub fn create_sandbox() -> LuaResult<Lua> {
    let lua = unsafe {
        Lua::unsafe_new_with(
            StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::COROUTINE,
            LuaOptions::default(),
        )
    };

    lua.globals().set("require", LuaNil)?;
    lua.globals().set("dofile", LuaNil)?;
    lua.globals().set("loadfile", LuaNil)?;

    register_log_module(&lua)?;

    Ok(lua)
}

/// `log.debug/info/warning/error(msg)`
fn register_log_module(lua: &Lua) -> LuaResult<()> {
    let log = lua.create_table()?;
    log.set(
        "debug",
        lua.create_function(|_, msg: String| {
            debug!("{}", msg);
            Ok(())
        })?,
    )?;
    log.set(
        "info",
        lua.create_function(|_, msg: String| {
            info!("{}", msg);
            Ok(())
        })?,
    )?;
    log.set(
        "warning",
        lua.create_function(|_, msg: String| {
            warn!("{}", msg);
            Ok(())
        })?,
    )?;
    log.set(
        "error",
        lua.create_function(|_, msg: String| {
            error!("{}", msg);
            Ok(())
        })?,
    )?;
    lua.globals().set("log", log)?;
    Ok(())
}

/// Binds targets to functions in Lua modules under a root directory
pub struct LuaBinder {
    root: PathBuf,
}

impl LuaBinder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Script file a target's module resolves to
    pub fn module_path(&self, target: &TaskTarget) -> PathBuf {
        let mut path = self.root.clone();
        for segment in target.module_segments() {
            path.push(segment);
        }
        path.set_extension("lua");
        path
    }
}

impl Binder for LuaBinder {
    fn bind(&self, target: &TaskTarget) -> Result<Arc<dyn Invocable>, RunnerError> {
        let path = self.module_path(target);
        let source = fs::read_to_string(&path).map_err(|e| {
            RunnerError::bind(target, format!("cannot read {}: {}", path.display(), e))
        })?;

        let lua = create_sandbox()
            .map_err(|e| RunnerError::bind(target, format!("sandbox: {}", e)))?;
        let exports: LuaValue = lua
            .load(&source)
            .set_name(chunk_name(&path))
            .eval()
            .map_err(|e| RunnerError::bind(target, e.to_string()))?;

        let attribute = target.attribute.as_str();
        let mut found = match &exports {
            LuaValue::Table(table) => table
                .get::<LuaValue>(attribute)
                .map_err(|e| RunnerError::bind(target, e.to_string()))?,
            _ => LuaNil,
        };
        if found.is_nil() {
            found = lua
                .globals()
                .get::<LuaValue>(attribute)
                .map_err(|e| RunnerError::bind(target, e.to_string()))?;
        }

        match found {
            LuaValue::Function(function) => {
                debug!("Bound {} from {}", target, path.display());
                Ok(Arc::new(LuaInvocable { lua, function }))
            }
            LuaValue::Nil => Err(RunnerError::bind(
                target,
                format!("{} does not define '{}'", path.display(), attribute),
            )),
            other => Err(RunnerError::bind(
                target,
                format!("'{}' is a {}, not a function", attribute, other.type_name()),
            )),
        }
    }
}

fn chunk_name(path: &Path) -> String {
    format!("@{}", path.display())
}

struct LuaInvocable {
    lua: Lua,
    function: LuaFunction,
}

impl Invocable for LuaInvocable {
    /// Positional args first, then the kwargs table when it is non-empty
    fn invoke(
        &self,
        args: &[JsonValue],
        kwargs: &Map<String, JsonValue>,
    ) -> anyhow::Result<JsonValue> {
        let mut values = Variadic::new();
        for arg in args {
            values.push(self.lua.to_value(arg)?);
        }
        if !kwargs.is_empty() {
            values.push(self.lua.to_value(kwargs)?);
        }

        let result: LuaValue = self.function.call(values)?;
        Ok(self.lua.from_value(result)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_module(root: &Path, relative: &str, source: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, source).unwrap();
    }

    #[test]
    fn test_sandbox_has_no_io() {
        let lua = create_sandbox().unwrap();
        let has_io: bool = lua.load("return io ~= nil or os ~= nil").eval().unwrap();
        assert!(!has_io);
        assert!(lua.load(r#"require("os")"#).exec().is_err());

        let has_log: bool = lua.load("return log ~= nil").eval().unwrap();
        assert!(has_log);
    }

    #[test]
    fn test_module_path() {
        let binder = LuaBinder::new("/flows");
        let target = TaskTarget::parse("jobs.nightly.etl:run").unwrap();
        assert_eq!(binder.module_path(&target), PathBuf::from("/flows/jobs/nightly/etl.lua"));
    }

    #[test]
    fn test_calls_returned_table_function() {
        let dir = tempfile::tempdir().unwrap();
        write_module(
            dir.path(),
            "jobs/etl.lua",
            r#"
            local M = {}
            function M.add(a, b) return a + b end
            return M
            "#,
        );

        let binder = LuaBinder::new(dir.path());
        let invocable = binder.bind(&TaskTarget::parse("jobs.etl:add").unwrap()).unwrap();
        let result = invocable.invoke(&[json!(2), json!(3)], &Map::new()).unwrap();
        assert_eq!(result, json!(5));
    }

    #[test]
    fn test_kwargs_table_is_trailing_argument() {
        let dir = tempfile::tempdir().unwrap();
        write_module(
            dir.path(),
            "jobs/etl.lua",
            r#"
            function greet(name, opts)
                if opts == nil then return "hello " .. name end
                return opts.greeting .. " " .. name
            end
            "#,
        );

        let binder = LuaBinder::new(dir.path());
        let invocable = binder.bind(&TaskTarget::parse("jobs.etl.greet").unwrap()).unwrap();

        let plain = invocable.invoke(&[json!("ferry")], &Map::new()).unwrap();
        assert_eq!(plain, json!("hello ferry"));

        let mut kwargs = Map::new();
        kwargs.insert("greeting".to_string(), json!("ahoy"));
        let with_kwargs = invocable.invoke(&[json!("ferry")], &kwargs).unwrap();
        assert_eq!(with_kwargs, json!("ahoy ferry"));
    }

    #[test]
    fn test_no_return_value_is_null() {
        let dir = tempfile::tempdir().unwrap();
        write_module(dir.path(), "jobs/etl.lua", "function run() log.info('ran') end");

        let binder = LuaBinder::new(dir.path());
        let invocable = binder.bind(&TaskTarget::parse("jobs.etl:run").unwrap()).unwrap();
        assert_eq!(invocable.invoke(&[], &Map::new()).unwrap(), JsonValue::Null);
    }

    #[test]
    fn test_bind_failures() {
        let dir = tempfile::tempdir().unwrap();
        write_module(dir.path(), "jobs/etl.lua", "answer = 42");
        let binder = LuaBinder::new(dir.path());

        for target in ["jobs.missing:run", "jobs.etl:run", "jobs.etl:answer"] {
            let err = binder.bind(&TaskTarget::parse(target).unwrap()).err().unwrap();
            assert_eq!(err.exit_code(), 3, "{}", target);
        }
    }

    #[test]
    fn test_script_error_fails_invocation() {
        let dir = tempfile::tempdir().unwrap();
        write_module(dir.path(), "jobs/etl.lua", "function run() error('boom') end");

        let binder = LuaBinder::new(dir.path());
        let invocable = binder.bind(&TaskTarget::parse("jobs.etl:run").unwrap()).unwrap();
        let err = invocable.invoke(&[], &Map::new()).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}

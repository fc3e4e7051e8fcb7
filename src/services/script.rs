/// Script sandbox collaborator
///
/// Script nodes hand source code and an input payload to a sandbox and get back
/// a result, an exit code and whatever the script printed. The embedded
/// implementation runs Lua 5.4 through mlua with the host-facing libraries
/// removed.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mlua::{DeserializeOptions, HookTriggers, LuaSerdeExt, VmState};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Script to run
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    pub language: String,
    pub code: String,
    /// Exposed to the script as the global `input`
    pub input: Value,
    pub timeout: Duration,
}

/// What the script produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptOutcome {
    /// Value returned by the chunk
    pub result: Value,
    /// 0 on success, 1 when the script raised an error
    pub exit_code: i32,
    /// Lines written with `print`
    pub stdout: Vec<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[async_trait]
pub trait ScriptSandbox: Send + Sync {
    /// Languages this sandbox accepts
    fn languages(&self) -> &[&'static str];

    async fn run(&self, request: ScriptRequest) -> Result<ScriptOutcome>;
}

/// Globals removed before user code runs
const BLOCKED_GLOBALS: [&str; 8] = [
    "os", "io", "debug", "package", "require", "dofile", "loadfile", "load",
];

/// Heap ceiling for one interpreter
const MEMORY_LIMIT_BYTES: usize = 64 * 1024 * 1024;

/// How often the deadline hook runs, in VM instructions
const HOOK_INSTRUCTION_INTERVAL: u32 = 10_000;

/// Embedded Lua 5.4 sandbox
///
/// Each run gets a fresh interpreter on a blocking thread, capped in memory.
/// An instruction hook aborts the script at its deadline, so a timed-out run
/// releases its thread.
#[derive(Debug, Default)]
pub struct LuaSandbox;

impl LuaSandbox {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScriptSandbox for LuaSandbox {
    fn languages(&self) -> &[&'static str] {
        &["lua"]
    }

    async fn run(&self, request: ScriptRequest) -> Result<ScriptOutcome> {
        if !self.languages().contains(&request.language.to_lowercase().as_str()) {
            return Err(anyhow!("Unsupported script language: {}", request.language));
        }

        let timeout = request.timeout;
        tracing::debug!("🧠 Running Lua script ({} bytes, timeout {:?})", request.code.len(), timeout);

        let handle =
            tokio::task::spawn_blocking(move || run_lua(&request.code, &request.input, timeout));
        match tokio::time::timeout(timeout, handle).await {
            Ok(joined) => joined.map_err(|e| anyhow!("Script worker failed: {}", e))?,
            Err(_) => Err(timed_out(timeout)),
        }
    }
}

fn timed_out(timeout: Duration) -> anyhow::Error {
    anyhow!("Script timed out after {} ms", timeout.as_millis())
}

/// Run a chunk in a fresh sandboxed interpreter
///
/// Host errors (bad setup) and deadline aborts are `Err`; errors raised by the
/// script, and results that cannot be converted to JSON, become an outcome
/// with exit code 1.
fn run_lua(code: &str, input: &Value, timeout: Duration) -> Result<ScriptOutcome> {
    let started = Instant::now();
    let lua = mlua::Lua::new();
    let globals = lua.globals();

    lua.set_memory_limit(MEMORY_LIMIT_BYTES)
        .map_err(|e| anyhow!("Failed to limit Lua memory: {}", e))?;

    let expired = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&expired);
    lua.set_hook(
        HookTriggers::new().every_nth_instruction(HOOK_INSTRUCTION_INTERVAL),
        move |_, _| {
            if started.elapsed() >= timeout {
                flag.store(true, Ordering::Relaxed);
                return Err(mlua::Error::runtime("script deadline exceeded"));
            }
            Ok(VmState::Continue)
        },
    )
    .map_err(|e| anyhow!("Failed to install Lua deadline hook: {}", e))?;

    for name in BLOCKED_GLOBALS {
        globals
            .set(name, mlua::Nil)
            .map_err(|e| anyhow!("Failed to sandbox Lua global '{}': {}", name, e))?;
    }

    let input_value = lua
        .to_value(input)
        .map_err(|e| anyhow!("Failed to pass input to Lua: {}", e))?;
    globals
        .set("input", input_value)
        .map_err(|e| anyhow!("Failed to set Lua input: {}", e))?;

    let stdout = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&stdout);
    let print = lua
        .create_function(move |_, args: mlua::Variadic<mlua::Value>| {
            let line = args
                .iter()
                .map(|arg| arg.to_string().unwrap_or_else(|_| "<unprintable>".to_string()))
                .collect::<Vec<_>>()
                .join("\t");
            if let Ok(mut lines) = captured.lock() {
                lines.push(line);
            }
            Ok(())
        })
        .map_err(|e| anyhow!("Failed to install Lua print: {}", e))?;
    globals
        .set("print", print)
        .map_err(|e| anyhow!("Failed to install Lua print: {}", e))?;

    let evaluated = lua
        .load(code)
        .eval::<mlua::Value>()
        .and_then(|value| lua.from_value_with::<Value>(value, json_options()));
    if expired.load(Ordering::Relaxed) {
        tracing::debug!("⏰ Lua script aborted at its deadline");
        return Err(timed_out(timeout));
    }

    let (result, exit_code, error) = match evaluated {
        Ok(value) => (value, 0, None),
        Err(e) => {
            tracing::debug!("❌ Lua script raised: {}", e);
            (Value::Null, 1, Some(e.to_string()))
        }
    };

    let stdout = stdout.lock().map(|lines| lines.clone()).unwrap_or_default();

    Ok(ScriptOutcome {
        result,
        exit_code,
        stdout,
        error,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

/// Lua → JSON conversion rules
///
/// Recursive tables are rejected; functions, threads and userdata become null.
fn json_options() -> DeserializeOptions {
    DeserializeOptions::new()
        .deny_unsupported_types(false)
        .deny_recursive_tables(true)
}

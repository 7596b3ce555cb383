use super::error::HostError;
use super::session::{SessionState, SharedSession};
use crate::security::lexical_normalize;
use mlua::{Lua, Table, Value};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Registry slot holding the module cache table
pub const REQUIRE_CACHE_KEY: &str = "LIME_REQUIRE_CACHE";

/// Source text located for a module
#[derive(Debug, Clone)]
pub struct ModuleSource {
    /// Chunk name used in error traces (e.g., "@app/util.lua")
    pub chunk_name: String,
    pub bytes: Vec<u8>,
}

/// Map a module name onto a relative file path.
///
/// Names that are absolute, contain a separator or already end in `.lua` are
/// taken literally; otherwise dots become directories (`ui.button` maps to
/// `ui/button.lua`).
pub fn module_relative_path(name: &str) -> String {
    let literal = Path::new(name).is_absolute()
        || name.contains('/')
        || name.contains('\\')
        || name.ends_with(".lua");

    if literal {
        name.to_string()
    } else {
        format!("{}.lua", name.replace('.', "/"))
    }
}

/// Find a module's source: archive (base dir, then root) first, then disk
/// (script dir, then current dir).
pub fn resolve_module(state: &SessionState, name: &str) -> Option<ModuleSource> {
    let relative = module_relative_path(name);
    let absolute = Path::new(&relative).is_absolute();

    if let Some(archive) = state.archive.as_ref() {
        if !absolute {
            let mut candidates = Vec::with_capacity(2);
            if !state.fused_base_dir.is_empty() {
                candidates.push(lexical_normalize(&format!(
                    "{}/{}",
                    state.fused_base_dir, relative
                )));
            }
            candidates.push(lexical_normalize(&relative));

            for candidate in candidates {
                debug!(module = name, candidate = %candidate, "trying archive");
                if let Some(bytes) = archive.get(&candidate) {
                    return Some(ModuleSource {
                        chunk_name: format!("@{candidate}"),
                        bytes: bytes.to_vec(),
                    });
                }
            }
        }
    }

    let mut candidates: Vec<PathBuf> = vec![state.script_dir.join(&relative)];
    if let Ok(cwd) = env::current_dir() {
        candidates.push(cwd.join(&relative));
    }

    for candidate in candidates {
        debug!(module = name, candidate = %candidate.display(), "trying disk");
        if !candidate.is_file() {
            continue;
        }
        match fs::read(&candidate) {
            Ok(bytes) => {
                return Some(ModuleSource {
                    chunk_name: format!("@{}", candidate.display()),
                    bytes,
                });
            }
            Err(err) => debug!(candidate = %candidate.display(), "unreadable module: {err}"),
        }
    }

    None
}

/// The session's module cache, created on first use
pub fn require_cache(lua: &Lua) -> mlua::Result<Table> {
    if let Value::Table(cache) = lua.named_registry_value::<Value>(REQUIRE_CACHE_KEY)? {
        return Ok(cache);
    }

    let cache = lua.create_table()?;
    lua.set_named_registry_value(REQUIRE_CACHE_KEY, cache.clone())?;
    Ok(cache)
}

/// Drop every memoized module
pub fn reset_require_cache(lua: &Lua) -> mlua::Result<()> {
    lua.set_named_registry_value(REQUIRE_CACHE_KEY, Value::Nil)
}

/// Load `name` once per session and return its memoized value.
///
/// A module returning nothing is stored as `true`. Nothing is cached until
/// the body finishes successfully, so a failed load can be retried.
pub fn require_module(lua: &Lua, session: &SharedSession, name: &str) -> mlua::Result<Value> {
    let cache = require_cache(lua)?;
    let cached: Value = cache.get(name)?;
    if !cached.is_nil() {
        return Ok(cached);
    }

    if session.borrow().loading.contains(name) {
        return Err(mlua::Error::external(HostError::ModuleNotFound(format!(
            "{name} (still loading)"
        ))));
    }

    let source = resolve_module(&session.borrow(), name)
        .ok_or_else(|| mlua::Error::external(HostError::ModuleNotFound(name.to_string())))?;
    debug!(module = name, chunk = %source.chunk_name, "loading module");

    session.borrow_mut().loading.insert(name.to_string());
    let result = lua
        .load(&source.bytes[..])
        .set_name(source.chunk_name)
        .into_function()
        .and_then(|body| body.call::<Value>(()));
    session.borrow_mut().loading.remove(name);

    let value = match result? {
        Value::Nil => Value::Boolean(true),
        value => value,
    };
    cache.set(name, value.clone())?;
    Ok(value)
}

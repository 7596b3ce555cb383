//! Native functions exposed to scripts through the `lime` global.

use super::require::require_module;
use super::session::SharedSession;
use crate::security::normalize_native;
use crate::store::StoreError;
use mlua::{Function, Lua, Table, Value, Variadic};
use std::env;
use std::path::PathBuf;

/// Register `print` and the `lime` table
pub fn install(lua: &Lua, session: &SharedSession) -> mlua::Result<()> {
    let globals = lua.globals();

    let print = lua.create_function(|_, args: Variadic<Value>| {
        let parts = args
            .iter()
            .map(|value| value.to_string())
            .collect::<mlua::Result<Vec<_>>>()?;
        println!("{}", parts.join("\t"));
        Ok(())
    })?;
    globals.set("print", print)?;

    let lime = lua.create_table()?;

    let s = session.clone();
    lime.set(
        "require",
        lua.create_function(move |lua, name: String| require_module(lua, &s, &name))?,
    )?;

    let s = session.clone();
    lime.set(
        "scriptDir",
        lua.create_function(move |_, ()| Ok(s.borrow().script_dir.display().to_string()))?,
    )?;

    let s = session.clone();
    lime.set(
        "exeDir",
        lua.create_function(move |_, ()| Ok(s.borrow().exe_dir.display().to_string()))?,
    )?;

    lime.set(
        "cwd",
        lua.create_function(|_, ()| {
            env::current_dir()
                .map(|dir| dir.display().to_string())
                .map_err(|err| mlua::Error::RuntimeError(format!("lime.cwd: {err}")))
        })?,
    )?;

    let path_join = lua.create_function(|_, parts: Variadic<String>| path_join(&parts))?;
    lime.set("pathJoin", path_join.clone())?;

    let s = session.clone();
    lime.set(
        "requestQuit",
        lua.create_function(move |lua, code: Option<i64>| {
            if s.borrow().quit_active {
                return Ok(false);
            }
            if negotiate_quit(lua, &s)? {
                return Ok(false);
            }
            s.borrow_mut().quit_request = Some(code.unwrap_or(0));
            Ok(true)
        })?,
    )?;

    let argv = session.borrow().argv.clone();
    lime.set("argv", lua.create_sequence_from(argv)?)?;

    lime.set("filesystem", filesystem_table(lua, session, path_join)?)?;
    lime.set("profiler", profiler_table(lua, session)?)?;
    lime.set("time", time_table(lua, session)?)?;

    globals.set("lime", lime)?;
    Ok(())
}

/// Replace `lime.argv`, if the script left the `lime` table in place
pub fn publish_argv(lua: &Lua, argv: &[String]) -> mlua::Result<()> {
    if let Value::Table(lime) = lua.globals().get::<Value>("lime")? {
        lime.set("argv", lua.create_sequence_from(argv.iter().cloned())?)?;
    }
    Ok(())
}

/// Look up `lime.<name>`; anything other than a function counts as absent
pub fn lime_callback(lua: &Lua, name: &str) -> mlua::Result<Option<Function>> {
    let Value::Table(lime) = lua.globals().get::<Value>("lime")? else {
        return Ok(None);
    };

    match lime.get::<Value>(name)? {
        Value::Function(callback) => Ok(Some(callback)),
        _ => Ok(None),
    }
}

/// Ask `lime.quit` whether to abort closing.
///
/// Re-entrant calls made while the callback is already running answer
/// "do not abort" without calling it again.
pub fn negotiate_quit(lua: &Lua, session: &SharedSession) -> mlua::Result<bool> {
    if session.borrow().quit_active {
        return Ok(false);
    }

    let Some(callback) = lime_callback(lua, "quit")? else {
        return Ok(false);
    };

    session.borrow_mut().quit_active = true;
    let result = callback.call::<bool>(());
    session.borrow_mut().quit_active = false;
    result
}

fn path_join(parts: &[String]) -> mlua::Result<String> {
    if parts.len() < 2 {
        return Err(mlua::Error::RuntimeError(
            "lime.pathJoin: expected at least 2 arguments".to_string(),
        ));
    }

    let mut joined = PathBuf::new();
    for part in parts {
        joined.push(part);
    }

    let normalized = normalize_native(&joined);
    if normalized.as_os_str().is_empty() {
        return Ok(".".to_string());
    }
    Ok(normalized.display().to_string())
}

/// Conventional script result for operations without a payload
fn status(result: Result<(), StoreError>) -> (bool, Option<String>) {
    match result {
        Ok(()) => (true, None),
        Err(err) => (false, Some(err.to_string())),
    }
}

fn filesystem_table(lua: &Lua, session: &SharedSession, path_join: Function) -> mlua::Result<Table> {
    let fs = lua.create_table()?;

    let s = session.clone();
    fs.set(
        "setIdentity",
        lua.create_function(move |_, name: String| {
            Ok(status(s.borrow_mut().store.set_identity(&name)))
        })?,
    )?;

    let s = session.clone();
    fs.set(
        "getSaveDir",
        lua.create_function(move |_, ()| Ok(s.borrow().store.save_dir().display().to_string()))?,
    )?;

    let s = session.clone();
    fs.set(
        "read",
        lua.create_function(move |lua, path: String| {
            let result = s.borrow_mut().store.read(&path);
            match result {
                Ok(bytes) => Ok((Some(lua.create_string(&bytes)?), None)),
                Err(err) => Ok((None, Some(err.to_string()))),
            }
        })?,
    )?;

    let s = session.clone();
    fs.set(
        "write",
        lua.create_function(move |_, (path, data): (String, mlua::String)| {
            let bytes = data.as_bytes();
            Ok(status(s.borrow_mut().store.write(&path, &bytes)))
        })?,
    )?;

    let s = session.clone();
    fs.set(
        "append",
        lua.create_function(move |_, (path, data): (String, mlua::String)| {
            let bytes = data.as_bytes();
            Ok(status(s.borrow_mut().store.append(&path, &bytes)))
        })?,
    )?;

    let s = session.clone();
    fs.set(
        "exists",
        lua.create_function(move |_, path: String| {
            Ok(s.borrow_mut().store.exists(&path).unwrap_or(false))
        })?,
    )?;

    let s = session.clone();
    fs.set(
        "isFile",
        lua.create_function(move |_, path: String| {
            Ok(s.borrow_mut().store.is_file(&path).unwrap_or(false))
        })?,
    )?;

    let s = session.clone();
    fs.set(
        "isDirectory",
        lua.create_function(move |_, path: String| {
            Ok(s.borrow_mut().store.is_directory(&path).unwrap_or(false))
        })?,
    )?;

    let s = session.clone();
    fs.set(
        "remove",
        lua.create_function(move |_, path: String| Ok(status(s.borrow_mut().store.remove(&path))))?,
    )?;

    let s = session.clone();
    fs.set(
        "mkdir",
        lua.create_function(move |_, path: String| Ok(status(s.borrow_mut().store.mkdir(&path))))?,
    )?;

    let s = session.clone();
    fs.set(
        "list",
        lua.create_function(move |lua, path: Option<String>| {
            let result = s.borrow_mut().store.list(path.as_deref().unwrap_or(""));
            let entries = match result {
                Ok(entries) => entries,
                Err(err) => return Ok((None, Some(err.to_string()))),
            };

            let listing = lua.create_table()?;
            for (i, entry) in entries.iter().enumerate() {
                let item = lua.create_table()?;
                item.set("name", entry.name.as_str())?;
                item.set("type", entry.kind.as_str())?;
                listing.set(i + 1, item)?;
            }
            Ok((Some(listing), None))
        })?,
    )?;

    fs.set("pathJoin", path_join)?;
    Ok(fs)
}

fn profiler_table(lua: &Lua, session: &SharedSession) -> mlua::Result<Table> {
    let profiler = lua.create_table()?;

    let s = session.clone();
    profiler.set(
        "start",
        lua.create_function(move |_, id: Option<String>| {
            let mut state = s.borrow_mut();
            match state.profiler.start(id.as_deref().unwrap_or("")) {
                Ok(()) => Ok(()),
                Err(err) => {
                    let message = format!("lime.profiler.start: {err}");
                    state.fatal = Some(message.clone());
                    Err(mlua::Error::RuntimeError(message))
                }
            }
        })?,
    )?;

    let s = session.clone();
    profiler.set(
        "stop",
        lua.create_function(move |_, ()| {
            s.borrow_mut().profiler.stop();
            Ok(())
        })?,
    )?;

    let s = session.clone();
    profiler.set(
        "get",
        lua.create_function(move |_, id: String| Ok(s.borrow().profiler.get(&id)))?,
    )?;

    let s = session.clone();
    profiler.set(
        "list",
        lua.create_function(move |lua, ()| lua.create_sequence_from(s.borrow().profiler.list()))?,
    )?;

    let s = session.clone();
    profiler.set(
        "reset",
        lua.create_function(move |_, ()| {
            s.borrow_mut().profiler.reset();
            Ok(())
        })?,
    )?;

    let s = session.clone();
    profiler.set(
        "clear",
        lua.create_function(move |_, ()| {
            s.borrow_mut().profiler.clear();
            Ok(())
        })?,
    )?;

    Ok(profiler)
}

fn time_table(lua: &Lua, session: &SharedSession) -> mlua::Result<Table> {
    let time = lua.create_table()?;

    let s = session.clone();
    time.set(
        "sinceStart",
        lua.create_function(move |_, ()| Ok(s.borrow().started.elapsed().as_secs_f64()))?,
    )?;

    time.set(
        "sinceEpoch",
        lua.create_function(|_, ()| Ok(chrono::Utc::now().timestamp()))?,
    )?;

    Ok(time)
}

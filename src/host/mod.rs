//! Script engine lifecycle and the callback protocol between the host loop
//! and the running script.

mod bindings;
mod error;
mod require;
mod session;


pub use bindings::{lime_callback, negotiate_quit};
pub use error::HostError;
pub use require::{ModuleSource, REQUIRE_CACHE_KEY, module_relative_path, resolve_module};
pub use session::{SessionState, SharedSession};

use crate::archive::{FusedArchive, normalize_entry_name};
use crate::config::HostConfig;
use crate::profiler::SectionTiming;
use crate::store::SaveStore;
use mlua::{FromLuaMulti, IntoLuaMulti, Lua, LuaOptions, StdLib};
use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Libraries scripts may use; io, os, package and debug stay closed
fn script_libs() -> StdLib {
    StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::UTF8 | StdLib::COROUTINE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPhase {
    Uninitialized,
    Initialized,
    Running,
    ShuttingDown,
}

impl HostPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            HostPhase::Uninitialized => "uninitialized",
            HostPhase::Initialized => "initialized",
            HostPhase::Running => "running",
            HostPhase::ShuttingDown => "shut down",
        }
    }
}

impl fmt::Display for HostPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns the script engine and everything a script session can touch.
///
/// Several hosts can coexist; none of them share state.
pub struct ScriptHost {
    phase: HostPhase,
    lua: Option<Lua>,
    session: SharedSession,
    /// `lime.init` has yet to run for the current script
    init_pending: bool,
}

impl ScriptHost {
    pub fn new(config: &HostConfig) -> Self {
        let store = SaveStore::new(config.resolved_data_root(), config.product_name.clone());
        Self {
            phase: HostPhase::Uninitialized,
            lua: None,
            session: Rc::new(RefCell::new(SessionState::new(store))),
            init_pending: false,
        }
    }

    pub fn phase(&self) -> HostPhase {
        self.phase
    }

    /// Create the engine and register native functions. Repeat calls are no-ops.
    pub fn init(&mut self) -> Result<(), HostError> {
        match self.phase {
            HostPhase::Initialized | HostPhase::Running => return Ok(()),
            HostPhase::ShuttingDown => {
                return Err(HostError::InvalidPhase {
                    phase: self.phase.as_str(),
                    action: "initialize",
                });
            }
            HostPhase::Uninitialized => {}
        }

        let lua = Lua::new_with(script_libs(), LuaOptions::default())?;
        bindings::install(&lua, &self.session)?;

        self.lua = Some(lua);
        self.phase = HostPhase::Initialized;
        info!("script engine initialized");
        Ok(())
    }

    /// Tear down the engine. The host cannot be used afterwards.
    pub fn shutdown(&mut self) {
        if self.phase == HostPhase::ShuttingDown {
            return;
        }

        self.lua = None;
        self.init_pending = false;
        {
            let mut state = self.session.borrow_mut();
            state.profiler.clear();
            state.loading.clear();
            state.archive = None;
        }
        self.phase = HostPhase::ShuttingDown;
        info!("script engine shut down");
    }

    /// Make an archive the first place modules are looked up
    pub fn attach_archive(&mut self, archive: FusedArchive) {
        debug!(files = archive.len(), "fused archive attached");
        self.session.borrow_mut().archive = Some(archive);
    }

    pub fn is_fused(&self) -> bool {
        self.session.borrow().archive.is_some()
    }

    pub fn set_exe_dir(&mut self, dir: &Path) {
        let dir = if dir.as_os_str().is_empty() {
            PathBuf::new()
        } else {
            std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf())
        };
        self.session.borrow_mut().exe_dir = dir;
    }

    /// Files passed at startup, exposed to scripts as `lime.argv`
    pub fn set_argv(&mut self, files: Vec<String>) -> Result<(), HostError> {
        if let Some(lua) = self.lua.as_ref() {
            bindings::publish_argv(lua, &files)?;
        }
        self.session.borrow_mut().argv = files;
        Ok(())
    }

    /// Run a main script from disk
    pub fn load_script(&mut self, path: &Path) -> Result<(), HostError> {
        let lua = self.engine("load a script")?.clone();

        let path = std::path::absolute(path).map_err(|source| HostError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let script_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        self.prepare_load(&lua, &script_dir, String::new())?;

        let source = fs::read(&path).map_err(|source| HostError::Io {
            path: path.display().to_string(),
            source,
        })?;

        self.run_main(&lua, &source, format!("@{}", path.display()))
    }

    /// Run a main script stored in the attached archive.
    ///
    /// Modules resolve relative to the entry's folder inside the archive; the
    /// script's home directory is the executable's folder.
    pub fn load_fused_script(&mut self, entry: &str) -> Result<(), HostError> {
        let lua = self.engine("load a fused script")?.clone();
        let entry = normalize_entry_name(entry);

        let source = {
            let state = self.session.borrow();
            let archive = state
                .archive
                .as_ref()
                .ok_or_else(|| HostError::NotFused(entry.clone()))?;
            archive
                .get(&entry)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| HostError::ModuleNotFound(entry.clone()))?
        };

        let base_dir = entry
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default();
        let exe_dir = self.session.borrow().exe_dir.clone();

        self.prepare_load(&lua, &exe_dir, base_dir)?;
        self.run_main(&lua, &source, format!("@{entry}"))
    }

    /// Dispatch `lime.init`, at most once per loaded script
    pub fn on_init(&mut self) -> Result<(), HostError> {
        if !self.init_pending {
            return Ok(());
        }
        self.init_pending = false;
        self.dispatch::<_, ()>("init", ())
    }

    pub fn on_update(&mut self, dt: f64) -> Result<(), HostError> {
        self.dispatch::<_, ()>("update", dt)
    }

    pub fn on_draw(&mut self) -> Result<(), HostError> {
        self.dispatch::<_, ()>("draw", ())
    }

    /// Returns whether the script handled the key
    pub fn on_key_down(
        &mut self,
        key: i32,
        scancode: i32,
        is_repeat: bool,
    ) -> Result<bool, HostError> {
        self.dispatch("keypressed", (key, scancode, is_repeat))
    }

    pub fn on_key_up(&mut self, key: i32, scancode: i32) -> Result<bool, HostError> {
        self.dispatch("keyreleased", (key, scancode))
    }

    /// Deliver a text codepoint as a UTF-8 string; invalid codepoints arrive
    /// as U+FFFD
    pub fn on_text_input(&mut self, codepoint: u32) -> Result<bool, HostError> {
        let text = char::from_u32(codepoint)
            .unwrap_or(char::REPLACEMENT_CHARACTER)
            .to_string();
        self.dispatch("textinput", text)
    }

    /// Ask the script whether to abort closing. `true` means keep running.
    pub fn on_quit(&mut self) -> Result<bool, HostError> {
        let Some(lua) = self.live_engine() else {
            return Ok(false);
        };

        let result = negotiate_quit(lua, &self.session);
        self.check_fatal()?;
        result.map_err(|err| callback_fault("quit", err))
    }

    /// Exit code requested by the script through `lime.requestQuit`
    pub fn take_quit_request(&mut self) -> Option<i64> {
        self.session.borrow_mut().quit_request.take()
    }

    pub fn active_profiler_section(&self) -> Option<String> {
        self.session.borrow().profiler.active().map(str::to_string)
    }

    pub fn profiler_report(&self) -> Vec<SectionTiming> {
        self.session.borrow().profiler.report()
    }

    pub fn save_dir(&self) -> PathBuf {
        self.session.borrow().store.save_dir()
    }

    pub fn identity(&self) -> String {
        self.session.borrow().store.identity().to_string()
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    fn live_engine(&self) -> Option<&Lua> {
        match self.phase {
            HostPhase::Initialized | HostPhase::Running => self.lua.as_ref(),
            _ => None,
        }
    }

    fn engine(&self, action: &'static str) -> Result<&Lua, HostError> {
        self.live_engine().ok_or(HostError::InvalidPhase {
            phase: self.phase.as_str(),
            action,
        })
    }

    fn prepare_load(
        &mut self,
        lua: &Lua,
        script_dir: &Path,
        fused_base_dir: String,
    ) -> Result<(), HostError> {
        require::reset_require_cache(lua)?;
        self.session
            .borrow_mut()
            .reset_for_load(script_dir, fused_base_dir);
        self.init_pending = false;
        Ok(())
    }

    fn run_main(&mut self, lua: &Lua, source: &[u8], chunk_name: String) -> Result<(), HostError> {
        info!(chunk = %chunk_name, identity = %self.identity(), "loading main script");

        let result = lua
            .load(source)
            .set_name(chunk_name.clone())
            .into_function()
            .and_then(|body| body.call::<()>(()));
        self.check_fatal()?;
        result.map_err(|err| HostError::fault(chunk_name, err))?;

        self.phase = HostPhase::Running;
        self.init_pending = true;
        Ok(())
    }

    /// Call `lime.<name>` if the script defines it.
    ///
    /// A missing callback yields the default result. A host-fatal condition
    /// raised during the call wins over the call's own outcome.
    fn dispatch<A, R>(&mut self, name: &str, args: A) -> Result<R, HostError>
    where
        A: IntoLuaMulti,
        R: FromLuaMulti + Default,
    {
        let Some(lua) = self.live_engine() else {
            return Err(HostError::InvalidPhase {
                phase: self.phase.as_str(),
                action: "dispatch callbacks",
            });
        };

        let result = match lime_callback(lua, name)? {
            Some(callback) => callback.call::<R>(args),
            None => Ok(R::default()),
        };
        self.check_fatal()?;

        result.map_err(|err| callback_fault(name, err))
    }

    fn check_fatal(&self) -> Result<(), HostError> {
        match self.session.borrow_mut().fatal.take() {
            Some(message) => Err(HostError::Fatal(message)),
            None => Ok(()),
        }
    }
}

/// A fault raised inside `lime.<name>`; logged, then handed to the caller
fn callback_fault(name: &str, err: mlua::Error) -> HostError {
    let fault = HostError::fault(format!("lime.{name}"), err);
    warn!("{fault}");
    fault
}

impl Drop for ScriptHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

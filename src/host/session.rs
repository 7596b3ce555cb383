use crate::archive::FusedArchive;
use crate::profiler::Profiler;
use crate::store::SaveStore;
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

/// Session state shared between the host and the native functions it
/// registers with the engine.
pub type SharedSession = Rc<RefCell<SessionState>>;

#[derive(Debug)]
pub struct SessionState {
    /// Home directory of the main script (the executable's folder when fused)
    pub script_dir: PathBuf,
    pub exe_dir: PathBuf,
    /// Folder of the main script inside the archive, without trailing slash
    pub fused_base_dir: String,
    pub archive: Option<FusedArchive>,
    pub store: SaveStore,
    pub profiler: Profiler,
    pub argv: Vec<String>,
    /// Modules whose body is currently executing
    pub loading: HashSet<String>,
    pub quit_active: bool,
    pub quit_request: Option<i64>,
    /// Set by a binding that hit a host-fatal condition
    pub fatal: Option<String>,
    pub started: Instant,
}

impl SessionState {
    pub fn new(store: SaveStore) -> Self {
        Self {
            script_dir: PathBuf::new(),
            exe_dir: PathBuf::new(),
            fused_base_dir: String::new(),
            archive: None,
            store,
            profiler: Profiler::new(),
            argv: Vec::new(),
            loading: HashSet::new(),
            quit_active: false,
            quit_request: None,
            fatal: None,
            started: Instant::now(),
        }
    }

    /// Forget per-script state before a new main script runs.
    ///
    /// The identity defaults to the name of the script's home directory.
    pub fn reset_for_load(&mut self, script_dir: &Path, fused_base_dir: String) {
        let dir_name = script_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.script_dir = script_dir.to_path_buf();
        self.fused_base_dir = fused_base_dir;
        self.store.reset(&dir_name);
        self.profiler.clear();
        self.loading.clear();
        self.quit_active = false;
        self.quit_request = None;
        self.fatal = None;
    }
}

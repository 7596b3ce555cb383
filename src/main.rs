use anyhow::{Context, Result};
use clap::Parser;
use limehost::{FusedArchive, HostConfig, LogLevel, ScriptHost, logging};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Run a Lime2D application without a window: init, a fixed number of
/// update/draw ticks, then the quit negotiation.
#[derive(Parser, Debug)]
#[command(name = "limehost", version, about)]
struct Cli {
    /// Main script, used when this executable carries no fused archive
    script: Option<PathBuf>,

    /// Files exposed to the script as lime.argv
    files: Vec<String>,

    /// Number of update/draw ticks to run
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Seconds passed to each update
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f64,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding per-product save folders
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// trace, debug, info, warn or error
    #[arg(long)]
    log_level: Option<String>,

    /// Print profiler sections as JSON when the run ends
    #[arg(long)]
    profile_report: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let level: LogLevel = config.log_level.parse().map_err(anyhow::Error::msg)?;
    logging::init(level);

    let code = run(&cli, &config)?;
    std::process::exit(i32::try_from(code).unwrap_or(1));
}

fn load_config(cli: &Cli) -> Result<HostConfig> {
    let mut config = match &cli.config {
        Some(path) => HostConfig::from_json_file(path)?,
        None => HostConfig::default(),
    };
    config = config.apply_env();

    if let Some(root) = &cli.data_root {
        config = config.data_root(root.clone());
    }
    if let Some(level) = &cli.log_level {
        config = config.log_level(level.clone());
    }
    Ok(config)
}

fn run(cli: &Cli, config: &HostConfig) -> Result<i64> {
    let mut host = ScriptHost::new(config);

    let exe = std::env::current_exe().context("failed to locate the running executable")?;
    if let Some(dir) = exe.parent() {
        host.set_exe_dir(dir);
    }

    match FusedArchive::open(&exe) {
        Ok(archive) if archive.contains(&config.entry_name) => {
            info!(files = archive.len(), bytes = archive.total_size(), "running fused application");
            host.attach_archive(archive);
        }
        Ok(_) => debug!(entry = %config.entry_name, "fused archive has no entry script"),
        Err(err) => debug!("not a fused executable: {err}"),
    }

    host.init().context("failed to initialize the script engine")?;

    let mut argv = cli.files.clone();
    if host.is_fused() {
        if let Some(script) = &cli.script {
            argv.insert(0, script.display().to_string());
        }
        host.set_argv(argv)?;
        host.load_fused_script(&config.entry_name)
            .with_context(|| format!("failed to run fused {}", config.entry_name))?;
    } else {
        let script = cli
            .script
            .as_ref()
            .context("no script given and no fused archive attached")?;
        host.set_argv(argv)?;
        host.load_script(script)
            .with_context(|| format!("failed to run {}", script.display()))?;
    }
    info!(save_dir = %host.save_dir().display(), "main script loaded");

    let code = match drive(&mut host, cli.frames, cli.dt) {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            1
        }
    };

    if cli.profile_report {
        println!("{}", serde_json::to_string_pretty(&host.profiler_report())?);
    }

    host.shutdown();
    Ok(code)
}

/// Tick the script until it asks to quit or the frame budget runs out
fn drive(host: &mut ScriptHost, frames: u64, dt: f64) -> Result<i64, limehost::HostError> {
    host.on_init()?;

    for frame in 0..frames {
        host.on_update(dt)?;
        host.on_draw()?;

        if let Some(code) = host.take_quit_request() {
            info!(frame, code, "script requested quit");
            return Ok(code);
        }
    }

    if host.on_quit()? {
        warn!("script aborted quit; frame budget exhausted");
    }
    Ok(0)
}

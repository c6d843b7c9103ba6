//! houndd: the Hound background service. Process wiring only — loads
//! config, builds the `SearcherRegistry`, and serves the control surface
//! (§10.6) until asked to stop. The HTTP/JSON query API and UI asset
//! server that would normally sit in front of this are out of scope
//! (§1); an operator drives this binary with the `hound` CLI instead.

mod control_server;
mod drivers;

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use hound_core::Config;
use hound_searcher::SearcherRegistry;

use crate::control_server::ControlServer;

fn main() -> anyhow::Result<()> {
    hound_core::logging::init();

    if std::env::args().any(|a| a == "--version" || a == "-V") {
        let b = &hound_core::build_info::CURRENT;
        println!("houndd {} ({}, built {})", b.version, b.git_sha, b.timestamp);
        return Ok(());
    }

    tracing::info!("houndd starting");

    let config = load_config()?;
    config.ensure_dbpath()?;

    let mut drivers = BTreeMap::new();
    for (name, repo) in &config.repos {
        drivers.insert(name.clone(), drivers::build(repo));
    }

    let registry = Arc::new(SearcherRegistry::spawn(&config, drivers)?);
    hound_core::daemon::write_pid(std::process::id())?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let socket_path = hound_core::paths::socket_path();
    let server = ControlServer::bind(&socket_path, Arc::clone(&registry), config.result_limit, Arc::clone(&shutdown))?;

    tracing::info!(repos = config.repos.len(), socket = %socket_path.display(), "houndd ready");
    server.run();

    tracing::info!("houndd stopping");
    registry.stop_all();
    let _ = hound_core::daemon::remove_pid_file();

    Ok(())
}

/// Loads config from `$HOUND_DIR/config.toml` (or `--config PATH`),
/// writing out a default file on first run so the CLI has something to
/// point an operator at. Parsing the TOML off disk happens entirely
/// inside `Config::load`; this function only resolves which path to
/// load (§1: "Configuration file parsing" plumbing stays minimal here).
fn load_config() -> anyhow::Result<Config> {
    let path = explicit_config_path().unwrap_or_else(|| hound_core::paths::hound_dir().join("config.toml"));

    if path.exists() {
        Ok(Config::load(&path)?)
    } else {
        let config = Config::default();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.save(&path)?;
        tracing::info!(path = %path.display(), "wrote default config");
        Ok(config)
    }
}

fn explicit_config_path() -> Option<std::path::PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(std::path::PathBuf::from);
        }
    }
    None
}

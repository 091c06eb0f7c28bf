use log::{LevelFilter, Metadata, Record};
use once_cell::sync::OnceCell;
use std::fs::{OpenOptions, create_dir_all};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use crate::error::LogError;

#[derive(Debug)]
struct AgentLogger {
    dir: PathBuf,
    agent_name: String,
    log_file: Mutex<PathBuf>,
    level: LevelFilter,
}

static LOGGER: OnceCell<AgentLogger> = OnceCell::new();

/// `<dir>/<game_id>/<agent>.log`, or `<dir>/<agent>.log` before the first game.
pub fn log_path(dir: &Path, game_id: Option<&str>, agent_name: &str) -> PathBuf {
    let file = format!("{agent_name}.log");
    match game_id {
        Some(game_id) if !game_id.is_empty() => dir.join(game_id).join(file),
        _ => dir.join(file),
    }
}

impl AgentLogger {
    fn new(dir: &Path, agent_name: &str, level: LevelFilter) -> Self {
        AgentLogger {
            dir: dir.to_path_buf(),
            agent_name: agent_name.to_string(),
            log_file: Mutex::new(log_path(dir, None, agent_name)),
            level,
        }
    }

    fn start_game(&self, game_id: &str) -> io::Result<PathBuf> {
        let path = log_path(&self.dir, Some(game_id), &self.agent_name);
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        *self.log_file.lock().unwrap_or_else(PoisonError::into_inner) = path.clone();
        Ok(path)
    }
}

impl log::Log for AgentLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let log_entry = format!(
                "{} {:<5} [{}] {}\n",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            );

            let log_file = self.log_file.lock().unwrap_or_else(PoisonError::into_inner);
            if let Ok(mut file) = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&*log_file)
            {
                let _ = file.write_all(log_entry.as_bytes());
            }
        }
    }

    fn flush(&self) {}
}

/// Installs the file logger. Entries go to `<dir>/<agent_name>.log` until
/// `start_game` names a game.
///
/// An unknown `level` string falls back to `debug`.
pub fn init(dir: &Path, agent_name: &str, level: &str) -> Result<(), LogError> {
    create_dir_all(dir)?;

    let level = LevelFilter::from_str(level).unwrap_or(LevelFilter::Debug);
    let logger = LOGGER.get_or_init(|| AgentLogger::new(dir, agent_name, level));

    log::set_logger(logger).map(|()| log::set_max_level(level))?;
    Ok(())
}

/// Redirects the installed logger to the file of `game_id`. A no-op before `init`.
pub fn start_game(game_id: &str) -> Result<(), LogError> {
    if let Some(logger) = LOGGER.get() {
        let path = logger.start_game(game_id)?;
        log::info!("Logging game {game_id} to {}", path.display());
    }
    Ok(())
}

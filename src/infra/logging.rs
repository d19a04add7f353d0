use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitLoggingError {
    #[error("home directory not found")]
    HomeDirNotFound,

    #[error("failed to create log file at {path}: {source}")]
    CreateLogFile { path: String, source: io::Error },
}

pub fn resolve_state_dir() -> Result<PathBuf, InitLoggingError> {
    if let Some(dir) = std::env::var_os("SNAPWATCH_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().ok_or(InitLoggingError::HomeDirNotFound)?;
    Ok(home.join(".snapwatch"))
}

/// Route the log facade to `<state dir>/snapwatch.log`. The TUI owns the
/// terminal, so nothing may write to stdout/stderr while it runs.
pub fn init_file_logging() -> Result<PathBuf, InitLoggingError> {
    let state_dir = resolve_state_dir()?;
    let path = state_dir.join("snapwatch.log");
    let create = fs::create_dir_all(&state_dir).and_then(|()| File::create(&path));
    let file = create.map_err(|source| InitLoggingError::CreateLogFile {
        path: path.display().to_string(),
        source,
    })?;

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build();
    // Ignore a second init; tests may have installed a logger already.
    let _ = WriteLogger::init(LevelFilter::Info, config, file);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn state_dir_env_override_wins() {
        let dir = tempdir().expect("tempdir");
        // SAFETY: test process only mutates its own environment.
        unsafe {
            std::env::set_var("SNAPWATCH_STATE_DIR", dir.path());
        }
        let resolved = resolve_state_dir().expect("state dir");
        assert_eq!(resolved, dir.path());
        unsafe {
            std::env::remove_var("SNAPWATCH_STATE_DIR");
        }
    }
}

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use env_logger::{Builder, Target};
use log::LevelFilter;

use crate::utils::expand_and_resolve_path;

#[derive(Clone, Copy, Debug)]
pub struct LogLevel(pub LevelFilter);
impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.to_lowercase().as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" | "warning" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" => LevelFilter::Off,
            _ => return Err(format!("Invalid log level: {}", s)),
        };
        Ok(LogLevel(level))
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        level.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogMode {
    Both,
    Path,
    Terminal,
    Discard,
}
impl std::str::FromStr for LogMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = match s.to_lowercase().as_str() {
            "both" => LogMode::Both,
            "path" | "file" => LogMode::Path,
            "terminal" | "term" | "cli" => LogMode::Terminal,
            "discard" | "none" => LogMode::Discard,
            _ => return Err(format!("Invalid log mode: {}", s)),
        };
        Ok(mode)
    }
}

/// Writes every log line to the terminal and to a file
struct TeeWriter {
    file: std::fs::File,
}
impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()?;
        self.file.flush()
    }
}

fn open_log_file(log_path: PathBuf) -> anyhow::Result<std::fs::File> {
    let path = expand_and_resolve_path(log_path)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    Ok(file)
}

pub fn setup_global_logger(
    log_level: LogLevel,
    log_output: LogMode,
    log_path: PathBuf,
) -> anyhow::Result<()> {
    let mut builder = Builder::new();
    builder.filter_level(log_level.0);

    match log_output {
        LogMode::Discard => {
            builder.filter_level(LevelFilter::Off);
        }
        LogMode::Terminal => {
            builder.target(Target::Stderr);
        }
        LogMode::Path => {
            let file = open_log_file(log_path)?;
            builder.target(Target::Pipe(Box::new(file)));
            builder.write_style(env_logger::WriteStyle::Never);
        }
        LogMode::Both => {
            let file = open_log_file(log_path)?;
            builder.target(Target::Pipe(Box::new(TeeWriter { file })));
            builder.write_style(env_logger::WriteStyle::Never);
        }
    };

    //Tests may have installed a logger already
    let _ = builder.try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_and_mode() {
        let level: LogLevel = "Warning".parse().unwrap();
        assert_eq!(LevelFilter::from(level), LevelFilter::Warn);
        assert!("loud".parse::<LogLevel>().is_err());

        assert_eq!("file".parse::<LogMode>().unwrap(), LogMode::Path);
        assert_eq!("none".parse::<LogMode>().unwrap(), LogMode::Discard);
        assert!("everywhere".parse::<LogMode>().is_err());
    }
}

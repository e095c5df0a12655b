use std::sync::OnceLock;

use crate::runtime;

///////////////////////////////
/// Global Config Options
pub static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: runtime::LogLevel,
    pub log_mode: runtime::LogMode,
    pub log_path: std::path::PathBuf,
}

impl Config {
    /// Store the config and set up logging from it. Only the first call has an effect
    pub fn init(config: Config) -> anyhow::Result<&'static Config> {
        let config = CONFIG.get_or_init(|| config);
        runtime::setup_global_logger(config.log_level, config.log_mode, config.log_path.clone())?;
        Ok(config)
    }
}

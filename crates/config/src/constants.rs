//! Fixed names used when locating configuration and reading overrides

pub const APP_DIR: &str = "cistep";
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const ENV_OUTPUT: &str = "CISTEP_OUTPUT";
pub const ENV_COLOR: &str = "CISTEP_COLOR";
pub const ENV_INTERRUPT_GRACE: &str = "CISTEP_INTERRUPT_GRACE";
pub const ENV_LOG_ENVIRON: &str = "CISTEP_LOG_ENVIRON";

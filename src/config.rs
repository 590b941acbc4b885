//! Launcher settings, resolved once from the environment.

use std::path::PathBuf;

pub const ENV_SHELL: &str = "SELFGUARD_SHELL";
pub const ENV_LOG: &str = "SELFGUARD_LOG";
pub const ENV_DISABLE: &str = "SELFGUARD_DISABLE";

const DEFAULT_SHELL: &str = "/bin/sh";
const DEFAULT_LOG: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Shell that runs the command words (`$SHELL -c ...`)
    pub shell: PathBuf,
    /// env_logger filter string
    pub log_filter: String,
    /// Skip the kill-guard, same as --no-protect
    pub disabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shell: PathBuf::from(DEFAULT_SHELL),
            log_filter: DEFAULT_LOG.to_string(),
            disabled: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(shell) = lookup(ENV_SHELL) {
            let shell = shell.trim();
            if !shell.is_empty() {
                settings.shell = PathBuf::from(shell);
            }
        }

        if let Some(filter) = lookup(ENV_LOG) {
            let filter = filter.trim();
            if !filter.is_empty() {
                settings.log_filter = filter.to_string();
            }
        }

        if let Some(value) = lookup(ENV_DISABLE) {
            settings.disabled = parse_flag(&value);
        }

        settings
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

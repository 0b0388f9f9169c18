use std::path::PathBuf;

/// `$XDG_CONFIG_HOME/factorio-dl`, falling back to `~/.config/factorio-dl`.
pub fn config_home(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    let base = env("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env("HOME").unwrap_or_default()).join(".config"));
    base.join("factorio-dl")
}

/// Where settings are read from when `--config` is not given.
pub fn default_config_path(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    config_home(env).join("config.toml")
}

use crate::config::Config;
use crate::utils::{ensure_dir, get_wxbridge_home};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_wxbridge_home()?.join("config.json"))
}

/// Load the config from `config_path`, the default location, or fall back
/// to defaults when no file exists.
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let default_path = get_config_path().unwrap_or_else(|_| PathBuf::from("config.json"));
    let path = config_path.unwrap_or(default_path.as_path());

    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config JSON from {}", path.display()))?;
        return Ok(config);
    }

    Ok(Config::default())
}

pub fn save_config(config: &Config, config_path: Option<&Path>) -> Result<()> {
    let default_path = get_config_path().unwrap_or_else(|_| PathBuf::from("config.json"));
    let path = config_path.unwrap_or(default_path.as_path());

    ensure_dir(path.parent().context("Config path has no parent")?)?;

    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    // Restrict permissions (best-effort, may fail on Windows)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupPolicy;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("config.json");
        let config = load_config(Some(&path)).expect("load");
        assert!(!config.channels.wechat.enabled);
    }

    #[test]
    fn round_trip_preserves_camel_case_keys() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("config.json");

        let mut config = Config::default();
        config.channels.wechat.enabled = true;
        config.channels.wechat.bot_name = Some("Bot".into());
        config.channels.wechat.group_policy = GroupPolicy::Always;
        save_config(&config, Some(&path)).expect("save");

        let raw = fs::read_to_string(&path).expect("read");
        assert!(raw.contains("\"bridgeUrl\""));
        assert!(raw.contains("\"groupPolicy\": \"always\""));

        let loaded = load_config(Some(&path)).expect("load");
        assert!(loaded.channels.wechat.enabled);
        assert_eq!(loaded.channels.wechat.bot_name.as_deref(), Some("Bot"));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("config.json");
        fs::write(&path, "{not json").expect("write");
        assert!(load_config(Some(&path)).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn saved_config_is_user_only() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("config.json");
        save_config(&Config::default(), Some(&path)).expect("save");
        let mode = fs::metadata(&path).expect("stat").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

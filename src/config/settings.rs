use anyhow::Result;
use directories::ProjectDirs;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::AppConfig;

const APP_NAME: &str = "FileSift";
const CONFIG_FILE: &str = "config.json";

/// Returns the platform-specific configuration directory for the application.
pub fn get_config_directory() -> Option<PathBuf> {
    ProjectDirs::from("com", "filesift", APP_NAME)
        .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
}

/// Returns the full path to the configuration file.
pub fn get_config_file_path() -> Option<PathBuf> {
    get_config_directory().map(|dir| dir.join(CONFIG_FILE))
}

fn resolve_path(path_override: Option<&Path>) -> Result<PathBuf> {
    match path_override {
        Some(path) => Ok(path.to_path_buf()),
        None => get_config_file_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory")),
    }
}

/// Loads the configuration, from `path_override` if given.
///
/// A missing file is created with defaults. A file that does not parse goes
/// through the legacy migration, and falls back to defaults if that fails too.
pub fn load_config(path_override: Option<&Path>) -> Result<AppConfig> {
    let config_path = resolve_path(path_override)?;

    if !config_path.exists() {
        tracing::info!(
            "Config file not found, creating default config at {:?}",
            config_path
        );
        let default_config = AppConfig::default();
        save_config(&default_config, Some(&config_path))?;
        return Ok(default_config);
    }

    let config_content = fs::read_to_string(&config_path)?;

    match serde_json::from_str::<AppConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", config_path);
            Ok(config)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse config file at {:?}: {}. Trying legacy migration.",
                config_path,
                e
            );
            migrate_legacy_config(&config_content).or_else(|e| {
                tracing::warn!("Legacy migration failed: {}. Using defaults.", e);
                Ok(AppConfig::default())
            })
        }
    }
}

/// Fills fields missing from (or null in) an older config file with defaults.
fn migrate_legacy_config(config_content: &str) -> Result<AppConfig> {
    let mut value: Value = serde_json::from_str(config_content)?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("Config is not a JSON object"))?;

    let defaults = AppConfig::default();

    let ensure_field = |obj: &mut serde_json::Map<String, Value>, key: &str, default_val: Value| {
        if !obj.contains_key(key) || obj.get(key) == Some(&Value::Null) {
            obj.insert(key.to_string(), default_val);
        }
    };

    ensure_field(obj, "exclude_dots", Value::Bool(defaults.exclude_dots));
    ensure_field(
        obj,
        "action_mode",
        serde_json::to_value(&defaults.action_mode)?,
    );
    ensure_field(obj, "view_mode", serde_json::to_value(defaults.view_mode)?);
    ensure_field(
        obj,
        "ignore_patterns",
        serde_json::to_value(&defaults.ignore_patterns)?,
    );
    ensure_field(
        obj,
        "checkpoint_batch_size",
        serde_json::to_value(defaults.checkpoint_batch_size)?,
    );
    ensure_field(
        obj,
        "read_batch_size",
        serde_json::to_value(defaults.read_batch_size)?,
    );
    // `output_directory` is optional; a missing key deserializes to `None`.
    if !obj.contains_key("output_directory") {
        obj.insert(
            "output_directory".to_string(),
            serde_json::to_value(&defaults.output_directory)?,
        );
    }
    ensure_field(
        obj,
        "export_layout",
        serde_json::to_value(defaults.export_layout)?,
    );

    let migrated_config: AppConfig = serde_json::from_value(Value::Object(obj.clone()))?;
    tracing::info!("Successfully migrated legacy config");
    Ok(migrated_config)
}

/// Saves the configuration, to `path_override` if given.
pub fn save_config(config: &AppConfig, path_override: Option<&Path>) -> Result<()> {
    let config_path = resolve_path(path_override)?;

    if let Some(config_dir) = config_path.parent() {
        if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
            tracing::info!("Created config directory: {:?}", config_dir);
        }
    }

    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, config_json)?;
    tracing::info!("Saved config to {:?}", config_path);

    Ok(())
}

/// Exports the configuration to a user-specified JSON file.
pub fn export_config(config: &AppConfig, export_path: &Path) -> Result<()> {
    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(export_path, config_json)?;
    tracing::info!("Exported config to {:?}", export_path);
    Ok(())
}

/// Imports a configuration from a user-specified JSON file.
pub fn import_config(import_path: &Path) -> Result<AppConfig> {
    let config_content = fs::read_to_string(import_path)?;
    match serde_json::from_str::<AppConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Imported config from {:?}", import_path);
            Ok(config)
        }
        Err(_) => {
            tracing::info!("Importing legacy config format from {:?}", import_path);
            migrate_legacy_config(&config_content)
        }
    }
}

// Platform-specific configuration paths for reference:
// macOS:   ~/Library/Application Support/com.filesift.FileSift/
// Linux:   ~/.config/filesift/
// Windows: %APPDATA%/filesift/FileSift/config/

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewMode;
    use crate::core::export::ExportLayout;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    #[serial]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
    }

    #[test]
    #[serial]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = AppConfig {
            exclude_dots: false,
            action_mode: "detect".into(),
            view_mode: ViewMode::List,
            ..Default::default()
        };
        save_config(&config, Some(&path)).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), config);
    }

    #[test]
    #[serial]
    fn test_legacy_config_is_migrated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "exclude_dots": false, "ignore_patterns": ["target/"], "view_mode": null }"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert!(!config.exclude_dots);
        assert!(config.ignore_patterns.contains("target/"));
        assert_eq!(config.view_mode, ViewMode::Tree);
        assert_eq!(config.action_mode, "md");
        assert_eq!(config.export_layout, ExportLayout::Tree);
    }

    #[test]
    #[serial]
    fn test_garbage_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json at all").unwrap();

        assert_eq!(load_config(Some(&path)).unwrap(), AppConfig::default());
    }

    #[test]
    #[serial]
    fn test_export_and_import() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exported.json");
        let config = AppConfig {
            checkpoint_batch_size: 7,
            export_layout: ExportLayout::Flat,
            ..Default::default()
        };

        export_config(&config, &path).unwrap();
        assert_eq!(import_config(&path).unwrap(), config);
    }

    #[test]
    #[serial]
    fn test_import_of_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(import_config(&dir.path().join("nope.json")).is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    #[serial]
    fn test_default_location_follows_xdg_config_home() {
        let dir = tempdir().unwrap();
        let previous = std::env::var_os("XDG_CONFIG_HOME");
        std::env::set_var("XDG_CONFIG_HOME", dir.path());

        let path = get_config_file_path().unwrap();
        let config = AppConfig::load();
        let expected = AppConfig::default();

        match previous {
            Some(value) => std::env::set_var("XDG_CONFIG_HOME", value),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
        assert!(path.starts_with(dir.path()));
        assert_eq!(config.unwrap(), expected);
        assert!(path.exists());
    }
}

use anyhow::Result;
use directories::ProjectDirs;
use mdcore::markdown::DEFAULT_SCOPE_CLASS;
use mdcore::theme::is_valid_class_name;
use mdcore::{Palette, RenderOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs::try_exists;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Multimedia/table tags, `data:` sources, token classes and raw HTML.
    pub extended_html: bool,
    pub output: OutputMode,
    pub theme: ThemeConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    Fragment,
    Document,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub scope_class: String,
    #[serde(default)]
    pub palette: Palette,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extended_html: true,
            output: OutputMode::Fragment,
            theme: ThemeConfig {
                scope_class: String::from(DEFAULT_SCOPE_CLASS),
                palette: Palette::default(),
            },
        }
    }
}

impl Config {
    /// Read the config file. Missing, empty and broken files give the
    /// defaults; nothing is ever written back.
    pub async fn load() -> Result<Self> {
        let Some(config_path) = Self::config_path() else {
            return Ok(Self::default());
        };

        if !try_exists(&config_path).await? {
            log::info!(
                "Config file does not exist, using defaults: {}",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let content = match tokio::fs::read_to_string(&config_path).await {
            Ok(content) => content,
            Err(io_err) => {
                log::error!("Failed to read config file: {}", io_err);
                return Ok(Self::default());
            }
        };

        if content.trim().is_empty() {
            log::warn!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        match serde_json::from_str::<Self>(&content) {
            Ok(mut config) => {
                config.validate()?;
                log::info!("Successfully loaded config from: {}", config_path.display());
                Ok(config)
            }
            Err(json_err) => {
                log::error!("Failed to parse config file: {}", json_err);

                // Keep a copy of the broken config for the user to repair
                let backup_path = config_path.with_extension("bak");
                if let Err(e) = tokio::fs::copy(&config_path, &backup_path).await {
                    log::warn!("Failed to backup broken config: {}", e);
                } else {
                    log::info!("Backed up broken config to: {}", backup_path.display());
                }

                Ok(Self::default())
            }
        }
    }

    /// Validate configuration values and fix invalid ones
    pub fn validate(&mut self) -> Result<()> {
        let mut has_issues = false;

        if !is_valid_class_name(&self.theme.scope_class) {
            log::warn!(
                "Invalid scope class: {:?}, using default",
                self.theme.scope_class
            );
            self.theme.scope_class = String::from(DEFAULT_SCOPE_CLASS);
            has_issues = true;
        }

        if self.theme.palette.validate() {
            has_issues = true;
        }

        if has_issues {
            log::info!("Configuration validation completed with corrections");
        }

        Ok(())
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            extended: self.extended_html,
            scope_class: self.theme.scope_class.clone(),
            palette: self.theme.palette.clone(),
        }
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("MDRENDER_CONFIG_PATH") {
            return Some(PathBuf::from(path));
        }

        if let Ok(dir) = std::env::var("MDRENDER_CONFIG_DIR") {
            return Some(PathBuf::from(dir).join("config.json"));
        }

        ProjectDirs::from("com", "mdrender", "mdrender")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};
    use tempfile::TempDir;

    fn config_test_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_config_dir(path: &std::path::Path) -> (Option<String>, Option<String>) {
        let previous_dir = std::env::var("MDRENDER_CONFIG_DIR").ok();
        let previous_path = std::env::var("MDRENDER_CONFIG_PATH").ok();
        std::env::set_var("MDRENDER_CONFIG_DIR", path);
        std::env::remove_var("MDRENDER_CONFIG_PATH");
        (previous_dir, previous_path)
    }

    fn restore_config_env(previous: (Option<String>, Option<String>)) {
        match previous.0 {
            Some(value) => std::env::set_var("MDRENDER_CONFIG_DIR", value),
            None => std::env::remove_var("MDRENDER_CONFIG_DIR"),
        }

        match previous.1 {
            Some(value) => std::env::set_var("MDRENDER_CONFIG_PATH", value),
            None => std::env::remove_var("MDRENDER_CONFIG_PATH"),
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.extended_html);
        assert_eq!(config.output, OutputMode::Fragment);
        assert_eq!(config.theme.scope_class, "markdown-body");
        assert_eq!(config.theme.palette, Palette::default());
    }

    #[test]
    fn test_render_options_follow_config() {
        let mut config = Config::default();
        config.extended_html = false;
        config.theme.scope_class = String::from("docs");

        let options = config.render_options();
        assert!(!options.extended);
        assert_eq!(options.scope_class, "docs");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();

        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"extended_html\""));
        assert!(json.contains("\"output\": \"Fragment\""));
        assert!(json.contains("\"scope_class\""));

        let config_from_json: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config.extended_html, config_from_json.extended_html);
        assert_eq!(config.theme.palette, config_from_json.theme.palette);
    }

    #[test]
    fn test_validate_fixes_bad_values() {
        let mut config = Config::default();
        config.theme.scope_class = String::from("bad class");
        config.theme.palette.text_blue = String::from("red;}body{display:none");

        config.validate().unwrap();
        assert_eq!(config.theme.scope_class, "markdown-body");
        assert_eq!(config.theme.palette.text_blue, "var(--color-text-blue)");
    }

    #[tokio::test]
    async fn test_config_load_default() {
        // Isolated directory so the user's config is never touched
        let _guard = config_test_lock().lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = TempDir::new().unwrap();
        let previous_env = set_config_dir(temp_dir.path());

        let config = Config::load().await;
        assert!(config.is_ok());

        let config = config.unwrap();
        assert!(config.extended_html);
        assert!(!temp_dir.path().join("config.json").exists());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);

        restore_config_env(previous_env);
    }

    #[tokio::test]
    async fn test_config_load_reads_file() {
        let _guard = config_test_lock().lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = TempDir::new().unwrap();
        let previous_env = set_config_dir(temp_dir.path());

        let path = temp_dir.path().join("config.json");
        let content = r#"{"extended_html": false, "output": "Document", "theme": {"scope_class": "docs"}}"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load().await.unwrap();
        assert!(!config.extended_html);
        assert_eq!(config.output, OutputMode::Document);
        assert_eq!(config.theme.scope_class, "docs");
        assert_eq!(config.theme.palette, Palette::default());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);

        restore_config_env(previous_env);
    }

    #[tokio::test]
    async fn test_empty_config_uses_defaults() {
        let _guard = config_test_lock().lock().unwrap_or_else(|e| e.into_inner());
        let temp_dir = TempDir::new().unwrap();
        let previous_env = set_config_dir(temp_dir.path());

        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "  \n").unwrap();

        let config = Config::load().await.unwrap();
        assert!(config.extended_html);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "  \n");

        restore_config_env(previous_env);
    }

    #[tokio::test]
    async fn test_broken_config_is_backed_up() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let _guard = config_test_lock().lock().unwrap_or_else(|e| e.into_inner());
        let previous_env = (
            std::env::var("MDRENDER_CONFIG_DIR").ok(),
            std::env::var("MDRENDER_CONFIG_PATH").ok(),
        );
        std::env::set_var("MDRENDER_CONFIG_PATH", &path);

        let config = Config::load().await.unwrap();
        assert_eq!(config.output, OutputMode::Fragment);
        assert!(path.with_extension("bak").exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");

        restore_config_env(previous_env);
    }
}

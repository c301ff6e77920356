use serde::Deserialize;
use std::{fs, io, path::Path};

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

/// Where the extraction and save endpoints live.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    pub extract_path: String,
    pub save_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            extract_path: "/api/extract".to_string(),
            save_path: "/api/save".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn extract_url(&self) -> String {
        join_url(&self.base_url, &self.extract_path)
    }

    pub fn save_url(&self) -> String {
        join_url(&self.base_url, &self.save_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub db_path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: "intake/drafts.db".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Like [`Config::load`], but a missing file means defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        match Self::load(&path) {
            Err(e) if e.downcast_ref::<io::Error>().is_some_and(|e| e.kind() == io::ErrorKind::NotFound) => {
                Ok(Self::default())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.log_filter, "info");
        assert_eq!(cfg.server.extract_url(), "http://localhost:5000/api/extract");
        assert_eq!(cfg.server.save_url(), "http://localhost:5000/api/save");
        assert_eq!(cfg.cache.db_path, "intake/drafts.db");
    }

    #[test]
    fn test_partial_server_section() {
        let cfg: Config = toml::from_str(
            r#"
            log_filter = "debug"

            [server]
            base_url = "https://intake.example.nl/"
            extract_path = "extract"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.log_filter, "debug");
        assert_eq!(cfg.server.extract_url(), "https://intake.example.nl/extract");
        assert_eq!(cfg.server.save_url(), "https://intake.example.nl/api/save");
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.server.base_url, "http://localhost:5000");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intake.toml");
        fs::write(&path, "[server\nbase_url = 1").unwrap();
        assert!(Config::load_or_default(&path).is_err());
    }
}

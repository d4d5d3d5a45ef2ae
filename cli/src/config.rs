use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_TIMEOUT_SECS: u64 = 180;
const DEFAULT_CATALOG_PAGE_SIZE: usize = 50;

/// Optional `config.toml` in the data directory. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    api_base_url: Option<String>,
    catalog_base_url: Option<String>,
    api_token: Option<String>,
    request_timeout_secs: Option<u64>,
    catalog_page_size: Option<usize>,
}

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    /// Base URL of the plan generation functions.
    pub api_base_url: Option<String>,
    pub catalog_base_url: Option<String>,
    pub api_token: Option<String>,
    pub request_timeout_secs: u64,
    pub catalog_page_size: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "plateplan").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let mut config = Self::from_dir(&data_dir)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Read `config.toml` from `data_dir` if present.
    fn from_dir(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("config.toml");
        let file: FileConfig = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("Invalid config file: {}", path.display()))?
        } else {
            FileConfig::default()
        };

        Ok(Config {
            db_path: data_dir.join("plateplan.db"),
            data_dir: data_dir.to_path_buf(),
            api_base_url: file.api_base_url,
            catalog_base_url: file.catalog_base_url,
            api_token: file.api_token,
            request_timeout_secs: file.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            catalog_page_size: file
                .catalog_page_size
                .unwrap_or(DEFAULT_CATALOG_PAGE_SIZE)
                .max(1),
        })
    }

    /// Environment variables win over the config file.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty("PLATEPLAN_API_URL") {
            self.api_base_url = Some(url);
        }
        if let Some(url) = non_empty("PLATEPLAN_CATALOG_URL") {
            self.catalog_base_url = Some(url);
        }
        if let Some(token) = non_empty("PLATEPLAN_API_TOKEN") {
            self.api_token = Some(token);
        }
    }

    /// Load the API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)` where `newly_created` is true on first run.
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok((key, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_dir(dir.path()).unwrap();
        assert_eq!(config.db_path, dir.path().join("plateplan.db"));
        assert!(config.api_base_url.is_none());
        assert_eq!(config.request_timeout_secs, 180);
        assert_eq!(config.catalog_page_size, 50);
    }

    #[test]
    fn test_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "api_base_url = \"https://functions.example.com\"\nrequest_timeout_secs = 30\n",
        )
        .unwrap();
        let config = Config::from_dir(dir.path()).unwrap();
        assert_eq!(
            config.api_base_url.as_deref(),
            Some("https://functions.example.com")
        );
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.catalog_page_size, 50);
    }

    #[test]
    fn test_invalid_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "request_timeout_secs = \"soon\"").unwrap();
        assert!(Config::from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "api_base_url = \"https://file.example.com\"\napi_token = \"from-file\"\n",
        )
        .unwrap();
        let mut config = Config::from_dir(dir.path()).unwrap();
        config.apply_env(|key| match key {
            "PLATEPLAN_API_URL" => Some("https://env.example.com".to_string()),
            "PLATEPLAN_API_TOKEN" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.api_base_url.as_deref(), Some("https://env.example.com"));
        // blank env values are ignored
        assert_eq!(config.api_token.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_api_key_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_dir(dir.path()).unwrap();
        let (key, new) = config.load_or_create_api_key().unwrap();
        assert!(new);
        assert_eq!(key.len(), 64);
        let (again, new) = config.load_or_create_api_key().unwrap();
        assert!(!new);
        assert_eq!(again, key);
    }
}

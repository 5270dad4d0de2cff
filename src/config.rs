//! Config module - Resolve cấu hình BDFS (Baidu netdisk) từ environment
//! hoặc file TOML.
//!
//! Thứ tự ưu tiên (first match wins, không merge):
//! 1. Bộ ba env vars `BDFS_CLIENT_ID` / `BDFS_CLIENT_SECRET` /
//!    `BDFS_TOKEN_PATH` (kèm `BDFS_DEFAULT_CLOUD_DIR` tùy chọn)
//! 2. File TOML tại `BDFS_CONFIG_FILE`, hoặc đường dẫn mặc định trong
//!    config directory của user

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Cấu hình truy cập BDFS, immutable sau khi resolve.
#[derive(Debug, Clone, Deserialize)]
pub struct BdfsConfig {
    // Field thiếu trong TOML thành chuỗi rỗng để báo Incomplete thay vì
    // lỗi parse
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Nơi lưu OAuth token (file JSON)
    #[serde(default)]
    pub token_path: String,
    /// Thư mục mặc định trên cloud, "/" nếu không chỉ định
    #[serde(default)]
    pub default_cloud_dir: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config file {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("config missing required fields (client_id, client_secret, token_path)")]
    Incomplete,
}

/// Snapshot các env vars liên quan, tách ra để test được không cần
/// mutate process environment.
struct EnvSnapshot {
    client_id: String,
    client_secret: String,
    token_path: String,
    default_cloud_dir: String,
    config_file: String,
}

impl EnvSnapshot {
    fn capture() -> Self {
        let get = |key: &str| std::env::var(key).unwrap_or_default();
        Self {
            client_id: get("BDFS_CLIENT_ID"),
            client_secret: get("BDFS_CLIENT_SECRET"),
            token_path: get("BDFS_TOKEN_PATH"),
            default_cloud_dir: get("BDFS_DEFAULT_CLOUD_DIR"),
            config_file: get("BDFS_CONFIG_FILE"),
        }
    }
}

/// Đường dẫn config file mặc định (~/.config/dockvault/config.toml)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("dockvault"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.toml")
}

/// Kiểm tra BDFS có được cấu hình qua environment không.
///
/// Dùng bởi dispatcher để quyết định export mặc định đi local hay cloud
/// khi user không truyền flag nào.
pub fn is_env_configured() -> bool {
    let env = EnvSnapshot::capture();
    !env.config_file.is_empty()
        || (!env.client_id.is_empty()
            && !env.client_secret.is_empty()
            && !env.token_path.is_empty())
}

impl BdfsConfig {
    /// Resolve cấu hình từ environment hoặc file.
    pub fn resolve() -> Result<Self, ConfigError> {
        Self::resolve_from(&EnvSnapshot::capture())
    }

    fn resolve_from(env: &EnvSnapshot) -> Result<Self, ConfigError> {
        // Bộ ba env vars đầy đủ thì không đụng tới file
        if !env.client_id.is_empty()
            && !env.client_secret.is_empty()
            && !env.token_path.is_empty()
        {
            return Ok(Self {
                client_id: env.client_id.clone(),
                client_secret: env.client_secret.clone(),
                token_path: env.token_path.clone(),
                default_cloud_dir: default_dir_or(&env.default_cloud_dir),
            });
        }

        let path = if env.config_file.is_empty() {
            default_config_path()
        } else {
            PathBuf::from(&env.config_file)
        };

        Self::from_file(&path)
    }

    /// Load cấu hình từ file TOML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: BdfsConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        if config.client_id.is_empty()
            || config.client_secret.is_empty()
            || config.token_path.is_empty()
        {
            return Err(ConfigError::Incomplete);
        }

        config.default_cloud_dir = default_dir_or(&config.default_cloud_dir);
        Ok(config)
    }
}

fn default_dir_or(dir: &str) -> String {
    if dir.is_empty() {
        "/".to_string()
    } else {
        dir.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn env(
        id: &str,
        secret: &str,
        token: &str,
        cloud_dir: &str,
        config_file: &str,
    ) -> EnvSnapshot {
        EnvSnapshot {
            client_id: id.to_string(),
            client_secret: secret.to_string(),
            token_path: token.to_string(),
            default_cloud_dir: cloud_dir.to_string(),
            config_file: config_file.to_string(),
        }
    }

    #[test]
    fn test_env_precedence_skips_file() {
        // Config file trỏ tới đường dẫn không tồn tại - env đầy đủ thì
        // file không bao giờ được đọc
        let snapshot = env("id", "secret", "/tmp/token.json", "", "/does/not/exist.toml");
        let config = BdfsConfig::resolve_from(&snapshot).unwrap();
        assert_eq!(config.client_id, "id");
        assert_eq!(config.default_cloud_dir, "/");
    }

    #[test]
    fn test_env_default_cloud_dir_respected() {
        let snapshot = env("id", "secret", "/tmp/token.json", "/docker-images", "");
        let config = BdfsConfig::resolve_from(&snapshot).unwrap();
        assert_eq!(config.default_cloud_dir, "/docker-images");
    }

    #[test]
    fn test_file_fallback_when_env_partial() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
client_id = "file-id"
client_secret = "file-secret"
token_path = "/tmp/token.json"
"#,
        );

        // Thiếu secret trong env nên phải rơi xuống file
        let snapshot = env("id", "", "", "", path.to_str().unwrap());
        let config = BdfsConfig::resolve_from(&snapshot).unwrap();
        assert_eq!(config.client_id, "file-id");
        assert_eq!(config.default_cloud_dir, "/");
    }

    #[test]
    fn test_file_default_cloud_dir_defaults_to_root() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
client_id = "id"
client_secret = "secret"
token_path = "/tmp/token.json"
"#,
        );
        let config = BdfsConfig::from_file(&path).unwrap();
        assert_eq!(config.default_cloud_dir, "/");
    }

    #[test]
    fn test_unreadable_file() {
        let err = BdfsConfig::from_file(Path::new("/does/not/exist.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { .. }));
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "client_id = [not toml");
        let err = BdfsConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[test]
    fn test_incomplete_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
client_id = "id"
client_secret = ""
token_path = "/tmp/token.json"
"#,
        );
        let err = BdfsConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Incomplete));
    }
}

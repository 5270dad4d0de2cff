//! BDFS OAuth Device Flow cho CLI authentication.
//!
//! Flow:
//! 1. CLI request device code từ Baidu
//! 2. User mở browser và nhập user code
//! 3. CLI poll để lấy access token
//! 4. Token (kèm refresh token) được lưu vào `token_path` trong config
//!
//! Lần chạy sau tool load token từ file, tự refresh khi hết hạn - user
//! chỉ phải authorize một lần.

use crate::config::BdfsConfig;
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Baidu OAuth endpoints
const DEVICE_CODE_URL: &str = "https://openapi.baidu.com/oauth/2.0/device/code";
const TOKEN_URL: &str = "https://openapi.baidu.com/oauth/2.0/token";

/// OAuth scope cho netdisk access
const NETDISK_SCOPE: &str = "basic,netdisk";

/// Coi token là hết hạn sớm hơn thực tế để tránh race với request đang bay
const EXPIRY_MARGIN_SECS: u64 = 60;

/// Response từ device code request
#[derive(Debug, Deserialize)]
pub struct DeviceCodeResponse {
    /// Code để gửi cho Baidu khi poll
    pub device_code: String,
    /// Code để user nhập vào browser
    pub user_code: String,
    /// URL để user mở
    pub verification_url: String,
    /// Thời gian device_code còn hiệu lực (seconds)
    pub expires_in: u64,
    /// Khoảng thời gian tối thiểu giữa các lần poll (seconds)
    pub interval: u64,
}

/// Response từ token endpoint (cả device_token lẫn refresh_token grant)
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Token đã cấp, persist dưới dạng JSON tại `token_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BdfsToken {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds) khi access token hết hạn
    pub expires_at: u64,
    #[serde(default)]
    pub scope: String,
}

impl BdfsToken {
    pub fn is_expired(&self) -> bool {
        now_secs() + EXPIRY_MARGIN_SECS >= self.expires_at
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Lưu token vào file (tạo thư mục cha nếu chưa có).
pub fn save_token(token: &BdfsToken, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(token)?;
    std::fs::write(path, json)
        .with_context(|| format!("Cannot write token file {}", path.display()))?;
    Ok(())
}

/// Load token từ file.
pub fn load_token(path: &Path) -> Result<BdfsToken> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read token file {}", path.display()))?;
    let token: BdfsToken = serde_json::from_str(&json)
        .with_context(|| format!("Cannot parse token file {}", path.display()))?;
    Ok(token)
}

/// OAuth Device Flow implementation cho Baidu.
pub struct DeviceFlow {
    client: reqwest::blocking::Client,
    client_id: String,
    client_secret: String,
}

impl DeviceFlow {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }
    }

    /// Bước 1: Request device code.
    /// User sẽ cần mở verification_url và nhập user_code.
    pub fn request_device_code(&self) -> Result<DeviceCodeResponse> {
        let response = self
            .client
            .get(DEVICE_CODE_URL)
            .query(&[
                ("response_type", "device_code"),
                ("client_id", self.client_id.as_str()),
                ("scope", NETDISK_SCOPE),
            ])
            .send()
            .context("Cannot request device code from Baidu")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            bail!("Baidu returned error {}: {}", status, body);
        }

        let device_code: DeviceCodeResponse = response
            .json()
            .context("Cannot parse device code response")?;

        Ok(device_code)
    }

    /// Bước 2: Poll cho access token sau khi user authorize trong browser.
    pub fn poll_for_token(&self, device_code: &DeviceCodeResponse) -> Result<BdfsToken> {
        let start = Instant::now();
        let timeout = Duration::from_secs(device_code.expires_in);
        let mut current_interval = Duration::from_secs(device_code.interval.max(5));

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message("Waiting for authorization in browser...");
        std::thread::sleep(current_interval);

        loop {
            let elapsed = start.elapsed();
            if elapsed > timeout {
                spinner.finish_and_clear();
                bail!("Device code expired. Please try again.");
            }

            let remaining = (timeout - elapsed).as_secs();
            spinner.set_message(format!(
                "Waiting for authorization in browser... ({} seconds left)",
                remaining
            ));

            match self.poll_once(&device_code.device_code)? {
                Some(token) => {
                    spinner.finish_and_clear();
                    return Ok(token);
                }
                None => {
                    // User chưa authorize, tăng nhẹ interval để tránh slow_down
                    current_interval += Duration::from_secs(1);
                    std::thread::sleep(current_interval);
                }
            }
        }
    }

    /// Poll một lần - trả về None khi user chưa authorize.
    fn poll_once(&self, device_code: &str) -> Result<Option<BdfsToken>> {
        let response = self
            .client
            .get(TOKEN_URL)
            .query(&[
                ("grant_type", "device_token"),
                ("code", device_code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .context("Cannot poll for access token")?;

        let response_text = response.text().context("Cannot read token response")?;
        let token_response: TokenResponse = serde_json::from_str(&response_text)
            .with_context(|| format!("Cannot parse token response: {}", response_text))?;

        if let Some(token) = into_token(token_response)? {
            return Ok(Some(token));
        }
        Ok(None)
    }

    /// Đổi refresh token lấy access token mới.
    pub fn refresh(&self, refresh_token: &str) -> Result<BdfsToken> {
        let response = self
            .client
            .get(TOKEN_URL)
            .query(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .context("Cannot refresh access token")?;

        let response_text = response.text().context("Cannot read token response")?;
        let token_response: TokenResponse = serde_json::from_str(&response_text)
            .with_context(|| format!("Cannot parse token response: {}", response_text))?;

        match into_token(token_response)? {
            Some(token) => Ok(token),
            None => bail!("Baidu did not return a token on refresh"),
        }
    }

    /// Full flow: request device code + hiện instructions + poll.
    pub fn authenticate<F>(&self, display_instructions: F) -> Result<BdfsToken>
    where
        F: FnOnce(&DeviceCodeResponse),
    {
        let device_code = self.request_device_code()?;
        display_instructions(&device_code);
        self.poll_for_token(&device_code)
    }
}

/// Map token response thành BdfsToken, None khi authorization còn pending.
fn into_token(response: TokenResponse) -> Result<Option<BdfsToken>> {
    if let Some(access_token) = response.access_token {
        let expires_at = now_secs() + response.expires_in.unwrap_or(0);
        return Ok(Some(BdfsToken {
            access_token,
            refresh_token: response.refresh_token.unwrap_or_default(),
            expires_at,
            scope: response.scope.unwrap_or_default(),
        }));
    }

    if let Some(error) = &response.error {
        match error.as_str() {
            "authorization_pending" | "slow_down" => return Ok(None),
            "expired_token" => bail!("Device code expired. Please try again."),
            "access_denied" => bail!("User denied authorization."),
            _ => {
                let desc = response.error_description.as_deref().unwrap_or("Unknown");
                bail!("OAuth error: {} - {}", error, desc);
            }
        }
    }

    Ok(None)
}

/// Lấy token sẵn dùng cho config đã cho: load từ file, refresh khi hết
/// hạn, hoặc chạy device flow lần đầu.
pub fn authorize(config: &BdfsConfig) -> Result<BdfsToken> {
    let token_path = Path::new(&config.token_path);
    let flow = DeviceFlow::new(&config.client_id, &config.client_secret);

    if token_path.exists() {
        let token = load_token(token_path)?;
        if !token.is_expired() {
            return Ok(token);
        }

        if !token.refresh_token.is_empty() {
            if let Ok(refreshed) = flow.refresh(&token.refresh_token) {
                save_token(&refreshed, token_path)?;
                return Ok(refreshed);
            }
        }
        // Refresh thất bại thì rơi xuống device flow mới
    }

    let token = flow.authenticate(|device_code| {
        println!("\nTo authorize DockVault with Baidu netdisk:");
        println!("  1. Open: {}", device_code.verification_url);
        println!("  2. Enter code: {}", device_code.user_code);
    })?;
    save_token(&token, token_path)?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_token_roundtrip() -> Result<()> {
        let dir = TempDir::new()?;
        // Parent directory chưa tồn tại - save phải tự tạo
        let path = dir.path().join("nested").join("token.json");

        let token = BdfsToken {
            access_token: "access_123".to_string(),
            refresh_token: "refresh_456".to_string(),
            expires_at: now_secs() + 3600,
            scope: NETDISK_SCOPE.to_string(),
        };

        save_token(&token, &path)?;
        let loaded = load_token(&path)?;

        assert_eq!(loaded.access_token, token.access_token);
        assert_eq!(loaded.refresh_token, token.refresh_token);
        assert!(!loaded.is_expired());
        Ok(())
    }

    #[test]
    fn test_token_expiry_margin() {
        let expired = BdfsToken {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            // Còn 30 giây nhưng margin là 60 nên coi như hết hạn
            expires_at: now_secs() + 30,
            scope: String::new(),
        };
        assert!(expired.is_expired());
    }

    #[test]
    fn test_into_token_pending() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"error":"authorization_pending","error_description":"x"}"#)
                .unwrap();
        assert!(into_token(response).unwrap().is_none());
    }

    #[test]
    fn test_into_token_denied() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"error":"access_denied"}"#).unwrap();
        assert!(into_token(response).is_err());
    }

    #[test]
    fn test_into_token_success() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"at","refresh_token":"rt","expires_in":2592000,"scope":"basic,netdisk"}"#,
        )
        .unwrap();
        let token = into_token(response).unwrap().unwrap();
        assert_eq!(token.access_token, "at");
        assert!(!token.is_expired());
    }

    // Note: Không test actual OAuth flow vì cần network access và user
    // interaction.
}

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    /// Explicit browser binary. If None, well-known install paths are probed.
    #[serde(default)]
    pub binary_path: Option<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    #[serde(default = "default_dashboard_host")]
    pub host: String,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    /// Bearer token for the HTTP API. If None, the API is open.
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_dashboard_host() -> String {
    "127.0.0.1".to_string()
}

fn default_dashboard_port() -> u16 {
    7878
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: default_dashboard_host(),
            port: default_dashboard_port(),
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_target_url")]
    pub target_url: String,
    #[serde(default = "default_ui_language")]
    pub ui_language: String,
    #[serde(default)]
    pub headless: bool,
    #[serde(default)]
    pub accept_cookies: bool,
    /// Live trading environment. Default is the simulation environment.
    #[serde(default)]
    pub live_mode: bool,
    #[serde(default = "default_template_file")]
    pub template_file: String,
    #[serde(default = "default_chart_selector")]
    pub chart_selector: String,
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "default_post_login_wait_secs")]
    pub post_login_wait_secs: u64,
    #[serde(default = "default_post_template_wait_secs")]
    pub post_template_wait_secs: u64,
    #[serde(default = "default_notification_poll_secs")]
    pub notification_poll_secs: u64,
    #[serde(default = "default_trade_settle_secs")]
    pub trade_settle_secs: u64,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

fn default_target_url() -> String {
    "https://web.ninjatrader.com/".to_string()
}

fn default_ui_language() -> String {
    "English".to_string()
}

fn default_template_file() -> String {
    "test_mode.json".to_string()
}

fn default_chart_selector() -> String {
    ".chart-inner-wrapper".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_post_login_wait_secs() -> u64 {
    10
}

fn default_post_template_wait_secs() -> u64 {
    5
}

fn default_notification_poll_secs() -> u64 {
    1
}

fn default_trade_settle_secs() -> u64 {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_url: default_target_url(),
            ui_language: default_ui_language(),
            headless: false,
            accept_cookies: false,
            live_mode: false,
            template_file: default_template_file(),
            chart_selector: default_chart_selector(),
            default_timeout_ms: default_timeout_ms(),
            post_login_wait_secs: default_post_login_wait_secs(),
            post_template_wait_secs: default_post_template_wait_secs(),
            notification_poll_secs: default_notification_poll_secs(),
            trade_settle_secs: default_trade_settle_secs(),
            browser: BrowserConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.target_url, "https://web.ninjatrader.com/");
        assert_eq!(cfg.ui_language, "English");
        assert!(!cfg.live_mode);
        assert_eq!(cfg.default_timeout_ms, 10_000);
        assert_eq!(cfg.dashboard.port, 7878);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let raw = r#"{
  "headless": true,
  "dashboard": { "port": 9000 },
  "someFutureKey": 42
}"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert!(cfg.headless);
        assert_eq!(cfg.dashboard.port, 9000);
        assert_eq!(cfg.dashboard.host, "127.0.0.1");
        assert_eq!(cfg.template_file, "test_mode.json");
        assert_eq!(cfg.chart_selector, ".chart-inner-wrapper");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp = tempfile::TempDir::new().unwrap();
        let paths = Paths::with_base(temp.path().to_path_buf());
        let mut cfg = Config::default();
        cfg.live_mode = true;
        cfg.browser.extra_args = vec!["--lang=en-US".to_string()];
        cfg.save(&paths.config_file()).unwrap();

        let loaded = Config::load(&paths.config_file()).unwrap();
        assert!(loaded.live_mode);
        assert_eq!(loaded.browser.extra_args, vec!["--lang=en-US".to_string()]);
    }
}

//! Owned browser session: one Chrome process plus its CDP connection.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use tradepilot_core::{Error, Result};

use crate::cdp::CdpClient;
use crate::chrome;

pub struct LaunchOptions {
    pub binary_path: Option<String>,
    pub profile_dir: PathBuf,
    /// BCP 47 locale passed to Chrome (drives the console's UI language).
    pub locale: String,
    pub headless: bool,
    pub extra_args: Vec<String>,
}

/// A live session. Lifecycle is `Closed -> Open -> Closed`: constructed by
/// [`BrowserSession::launch`], released by [`BrowserSession::close`] (or by
/// drop, which kills the child).
pub struct BrowserSession {
    /// Remote debugging port of the Chrome child.
    pub debug_port: u16,
    /// Persistent profile backing this session.
    pub profile_dir: PathBuf,
    chrome_process: Child,
    pub cdp: CdpClient,
}

impl BrowserSession {
    pub async fn launch(opts: &LaunchOptions) -> Result<Self> {
        let binary = chrome::find_chrome_binary(opts.binary_path.as_deref())
            .ok_or_else(|| Error::Browser("Chrome not found. Please install it.".to_string()))?;

        std::fs::create_dir_all(&opts.profile_dir)?;

        let debug_port = chrome::find_free_port().await?;
        let args = chrome::build_chrome_args(
            debug_port,
            &opts.profile_dir,
            &opts.locale,
            opts.headless,
            &opts.extra_args,
        );

        info!(
            port = debug_port,
            headless = opts.headless,
            binary = %binary,
            "Launching Chrome"
        );

        let child = Command::new(&binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Browser(format!("Failed to launch Chrome: {}", e)))?;

        let _browser_ws_url = chrome::wait_for_devtools(debug_port, 15).await?;

        // Connect to the page target (not browser-level) so Page.enable works.
        let page_ws_url = chrome::page_ws_url(debug_port).await?;
        let cdp = CdpClient::connect(&page_ws_url).await?;

        cdp.enable_domain("Page").await?;
        cdp.enable_domain("Runtime").await?;
        cdp.enable_domain("DOM").await?;
        cdp.enable_domain("Network").await?;

        info!(ws_url = %page_ws_url, "CDP connection established (page target)");

        Ok(Self {
            debug_port,
            profile_dir: opts.profile_dir.clone(),
            chrome_process: child,
            cdp,
        })
    }

    /// Snapshot cookies and current-origin localStorage to a JSON file, so
    /// the next session starts signed in even if the profile dir is lost.
    pub async fn save_storage_state(&self, path: &Path) -> Result<()> {
        let cookies = self
            .cdp
            .get_cookies()
            .await?
            .get("cookies")
            .cloned()
            .unwrap_or_else(|| json!([]));

        let origin_state = self
            .cdp
            .evaluate_js(
                r#"(() => {
                    const items = [];
                    for (let i = 0; i < localStorage.length; i++) {
                        const name = localStorage.key(i);
                        items.push({ name: name, value: localStorage.getItem(name) });
                    }
                    return { origin: location.origin, localStorage: items };
                })()"#,
            )
            .await?
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null);

        let state = json!({
            "cookies": cookies,
            "origins": [origin_state],
        });
        let content = serde_json::to_string_pretty(&state)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Close the session: graceful CDP shutdown first, then kill.
    pub async fn close(&mut self) {
        if let Err(e) = self.cdp.send_command("Browser.close", json!({})).await {
            debug!("CDP Browser.close failed (may already be closed): {}", e);
        }
        let _ = self.chrome_process.kill().await;
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Best-effort kill on drop
        let _ = self.chrome_process.start_kill();
    }
}

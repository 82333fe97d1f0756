//! Chrome discovery and launch plumbing: binary lookup, debugging port,
//! argument set, DevTools readiness polling.

use serde_json::Value;

use tradepilot_core::{Error, Result};

/// Find a Chrome/Chromium binary. An explicit override wins; otherwise
/// well-known install locations are probed, then `$PATH`.
pub fn find_chrome_binary(override_path: Option<&str>) -> Option<String> {
    if let Some(path) = override_path {
        if !path.trim().is_empty() {
            return Some(path.to_string());
        }
    }

    let candidates: Vec<&str> = if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
        ]
    } else {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    };

    for candidate in candidates {
        if std::path::Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        if !candidate.contains('/') && !candidate.contains('\\') {
            if which::which(candidate).is_ok() {
                return Some(candidate.to_string());
            }
        }
    }
    None
}

/// Find a free TCP port for the debugging endpoint.
pub async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Command line for a persistent-profile trading session.
pub fn build_chrome_args(
    debug_port: u16,
    user_data_dir: &std::path::Path,
    locale: &str,
    headless: bool,
    extra_args: &[String],
) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", debug_port),
        format!("--user-data-dir={}", user_data_dir.display()),
        format!("--lang={}", locale),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-extensions".to_string(),
        "--disable-sync".to_string(),
        "--disable-translate".to_string(),
        "--metrics-recording-only".to_string(),
        "--safebrowsing-disable-auto-update".to_string(),
        "--password-store=basic".to_string(),
    ];
    if headless {
        args.push("--headless=new".to_string());
        args.push("--window-size=1920,1080".to_string());
    } else {
        args.push("--start-maximized".to_string());
    }
    args.extend(extra_args.iter().cloned());
    args.push("about:blank".to_string());
    args
}

/// Wait for Chrome's DevTools endpoint to come up.
/// Polls /json/version until it responds, up to `timeout_secs`.
pub async fn wait_for_devtools(port: u16, timeout_secs: u64) -> Result<String> {
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_secs(timeout_secs);
    let url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Timeout(format!(
                "Chrome DevTools not ready after {}s on port {}",
                timeout_secs, port
            )));
        }

        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if let Some(ws_url) = body.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}

/// WebSocket URL of the first page target.
/// Chrome exposes /json/list; the page target may take a moment to appear.
pub async fn page_ws_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{}/json/list", port);

    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        }

        let resp = match reqwest::get(&url).await {
            Ok(r) => r,
            Err(_) => continue,
        };
        let targets: Vec<Value> = match resp.json().await {
            Ok(t) => t,
            Err(_) => continue,
        };

        for target in &targets {
            if target.get("type").and_then(|v| v.as_str()) == Some("page") {
                if let Some(ws_url) = target.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }
    }

    Err(Error::Browser(
        "No page target found after retries".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_args_headed() {
        let dir = PathBuf::from("/tmp/profile");
        let args = build_chrome_args(9222, &dir, "en-US", false, &[]);
        assert!(args.contains(&"--remote-debugging-port=9222".to_string()));
        assert!(args.contains(&"--user-data-dir=/tmp/profile".to_string()));
        assert!(args.contains(&"--lang=en-US".to_string()));
        assert!(args.contains(&"--start-maximized".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
        assert_eq!(args.last().map(|s| s.as_str()), Some("about:blank"));
    }

    #[test]
    fn test_args_headless_with_extras() {
        let dir = PathBuf::from("/tmp/profile");
        let extra = vec!["--force-dark-mode".to_string()];
        let args = build_chrome_args(9222, &dir, "en-US", true, &extra);
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--force-dark-mode".to_string()));
        assert!(!args.contains(&"--start-maximized".to_string()));
    }

    #[test]
    fn test_explicit_binary_override_wins() {
        let found = find_chrome_binary(Some("/opt/custom/chrome"));
        assert_eq!(found.as_deref(), Some("/opt/custom/chrome"));
    }

    #[tokio::test]
    async fn test_free_port_is_nonzero() {
        let port = find_free_port().await.unwrap();
        assert!(port > 0);
    }
}

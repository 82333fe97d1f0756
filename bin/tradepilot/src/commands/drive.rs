use tracing::warn;

use tradepilot_browser::{ConsoleDriver, TradingConsole};
use tradepilot_core::{Config, Paths, Result};

/// Scripted one-shot session: open, run the requested actions in order,
/// then close. The browser is torn down even when a step fails.
pub async fn run(
    data: bool,
    screenshot: bool,
    trade: Vec<String>,
    watch_status: bool,
    keep_open: bool,
) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let mut console = TradingConsole::new(config, paths)?;

    let opened = console.open().await?;
    println!("{}", opened);

    let result = drive_session(&mut console, data, screenshot, &trade, watch_status).await;

    if keep_open && result.is_ok() {
        println!("Browser stays open. Press Ctrl-C to close.");
        tokio::signal::ctrl_c().await?;
    }

    match console.close().await {
        Ok(msg) => println!("{}", msg),
        Err(e) => warn!(error = %e, "Close failed"),
    }

    result?;
    Ok(())
}

async fn drive_session(
    console: &mut TradingConsole,
    data: bool,
    screenshot: bool,
    trade: &[String],
    watch_status: bool,
) -> Result<()> {
    if data {
        let tab = console.active_tab().await?;
        println!("Active tab: {} (refreshed {})", tab.name, tab.refresh_time);
        let snapshot = console.market_data().await?;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    if screenshot {
        let bytes = console.chart_screenshot().await?;
        println!("Chart screenshot captured ({} bytes)", bytes.len());
    }

    for caption in trade {
        console.trade_action(caption).await?;
        println!("Clicked '{}'", caption);
        if watch_status {
            let status = console.trade_status().await?;
            println!("Trade status: {}", status);
        }
    }

    Ok(())
}

//! High-level driver for the web trading console.
//!
//! [`TradingConsole`] owns the browser session and knows the page: where
//! the quote panel lives, how login works, which captions the order
//! buttons carry. The command worker talks to it through the
//! [`ConsoleDriver`] trait so tests can substitute a double.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use tradepilot_core::notify::{classify, NotificationKind};
use tradepilot_core::{
    ActiveTab, BlockDocument, Config, Error, FieldExtractor, MarketSnapshot, Paths,
    QuotePanelExtractor, Result, TradeStatus, UiText,
};

use crate::page::Page;
use crate::session::{BrowserSession, LaunchOptions};

const TEMPLATE_CONTROL: &str = "div.btn-wrap.add-module";
const LANGUAGE_SELECT: &str = "#language-select";
const FILE_INPUT: &str = "input[type='file']";
const QUOTE_PANEL: &str = ".lm_items .gm-scroll-view";
const TAB_HEADER: &str = ".lm_header .lm_tabs";
const ACTIVE_TAB: &str = ".lm_header .lm_tabs .lm_active";
const NOTIFICATION_TICKER: &str = ".notification-ticker";

/// Driver seam between the command worker and the browser.
#[async_trait]
pub trait ConsoleDriver: Send {
    /// Launch the browser, sign in and load the trading template.
    /// Returns the confirmation text for the reply.
    async fn open(&mut self) -> Result<String>;

    /// Scrape the quote panel of the active instrument tab.
    async fn market_data(&mut self) -> Result<MarketSnapshot>;

    /// Capture the chart area as PNG bytes.
    async fn chart_screenshot(&mut self) -> Result<Vec<u8>>;

    /// Release the browser. Returns the confirmation text for the reply.
    async fn close(&mut self) -> Result<String>;
}

/// What the landing page offers after navigation.
enum EntryControl {
    /// Template control visible: the profile is already signed in.
    Template,
    /// Login form visible.
    Login,
}

pub struct TradingConsole {
    config: Config,
    paths: Paths,
    labels: UiText,
    extractor: Box<dyn FieldExtractor + Send + Sync>,
    session: Option<BrowserSession>,
}

impl TradingConsole {
    pub fn new(config: Config, paths: Paths) -> Result<Self> {
        let labels = UiText::load_or_default(&paths, &config.ui_language)?;
        Ok(Self {
            config,
            paths,
            labels,
            extractor: Box::new(QuotePanelExtractor),
            session: None,
        })
    }

    /// Swap the field extractor (e.g. for a newer panel layout).
    pub fn with_extractor(mut self, extractor: Box<dyn FieldExtractor + Send + Sync>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Page handle over the open session. The session guard for every
    /// browser-touching operation.
    fn page(&self) -> Result<Page<'_>> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| Error::Session("No browser session open".to_string()))?;
        Ok(Page::new(&session.cdp, self.config.default_timeout_ms))
    }

    /// Run the configured extractor over scraped quote-panel blocks.
    fn snapshot_from_blocks(&self, blocks: Vec<String>) -> Result<MarketSnapshot> {
        let doc = BlockDocument::new(blocks);
        Ok(self.extractor.extract(&doc)?)
    }

    fn credentials() -> Result<(String, String)> {
        let username = std::env::var("TRADER_USERNAME")
            .map_err(|_| Error::Config("TRADER_USERNAME not set".to_string()))?;
        let password = std::env::var("TRADER_PASSWORD")
            .map_err(|_| Error::Config("TRADER_PASSWORD not set".to_string()))?;
        Ok((username, password))
    }

    fn template_path(&self) -> PathBuf {
        let configured = PathBuf::from(&self.config.template_file);
        if configured.is_absolute() {
            configured
        } else {
            self.paths.template_file(&self.config.template_file)
        }
    }

    async fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
    }

    /// Full open sequence. Callers go through [`ConsoleDriver::open`],
    /// which adds the failure teardown.
    async fn open_inner(&mut self, username: &str, password: &str) -> Result<String> {
        self.paths.ensure_dirs()?;

        let opts = LaunchOptions {
            binary_path: self.config.browser.binary_path.clone(),
            profile_dir: self.paths.profile_dir(),
            locale: self.labels.text("locale"),
            headless: self.config.headless,
            extra_args: self.config.browser.extra_args.clone(),
        };
        self.session = Some(BrowserSession::launch(&opts).await?);

        let page = self.page()?;
        info!(url = %self.config.target_url, "Opening trading console");
        page.goto(&self.config.target_url).await?;

        match self.wait_for_entry_controls(&page).await? {
            EntryControl::Template => {
                info!("Session already signed in, skipping login");
            }
            EntryControl::Login => {
                self.login(&page, username, password).await?;
            }
        }

        if let Some(session) = self.session.as_ref() {
            if let Err(e) = session.save_storage_state(&self.paths.state_file()).await {
                warn!("Failed to persist storage state: {}", e);
            }
        }

        let png = page.screenshot_page().await?;
        self.save_media("login", &png)?;

        self.load_template(&page).await?;

        Ok("Webpage opened and logged in".to_string())
    }

    /// Wait for the landing page to show either the template control or
    /// the login button.
    async fn wait_for_entry_controls(&self, page: &Page<'_>) -> Result<EntryControl> {
        let login_label = self.labels.text("login_button");
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(self.config.default_timeout_ms);
        loop {
            if page.exists(TEMPLATE_CONTROL).await? {
                return Ok(EntryControl::Template);
            }
            if page.button_exists(&login_label).await? {
                return Ok(EntryControl::Login);
            }
            if start.elapsed() > timeout {
                return Err(Error::UnmodeledState(format!(
                    "neither the '{}' button nor the '{}' control is present",
                    login_label, TEMPLATE_CONTROL
                )));
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }

    async fn login(&self, page: &Page<'_>, username: &str, password: &str) -> Result<()> {
        info!("Logging in");
        page.select_option_by_label(LANGUAGE_SELECT, self.labels.language())
            .await?;
        page.fill_by_label(&self.labels.text("username_label"), username)
            .await?;
        page.fill_by_label(&self.labels.text("password_label"), password)
            .await?;

        if self.config.accept_cookies {
            let accept = self.labels.text("accept_cookies");
            if let Err(e) = page.click_button_by_name(&accept).await {
                debug!("Cookie banner not clicked: {}", e);
            }
        }

        page.click_button_by_name(&self.labels.text("login_button"))
            .await?;

        tokio::time::sleep(std::time::Duration::from_secs(
            self.config.post_login_wait_secs,
        ))
        .await;
        page.wait_for_ready_state().await?;

        let mode_label = if self.config.live_mode {
            self.labels.text("live_button")
        } else {
            self.labels.text("simulation_button")
        };
        info!(mode = %mode_label, "Selecting trading mode");
        page.click_button_by_name(&mode_label).await?;
        page.wait_for_ready_state().await?;
        Ok(())
    }

    /// Load the configured UI layout template through the console's file
    /// picker.
    async fn load_template(&self, page: &Page<'_>) -> Result<()> {
        let template = self.template_path();
        info!(template = %template.display(), "Loading layout template");

        page.wait_for_selector(TEMPLATE_CONTROL, self.config.default_timeout_ms)
            .await?;
        page.click_selector(TEMPLATE_CONTROL).await?;
        page.upload_file(FILE_INPUT, &template).await?;

        tokio::time::sleep(std::time::Duration::from_secs(
            self.config.post_template_wait_secs,
        ))
        .await;
        Ok(())
    }

    fn save_media(&self, prefix: &str, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(self.paths.media_dir())?;
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self.paths.media_dir().join(format!("{}_{}.png", prefix, ts));
        std::fs::write(&path, bytes)?;
        debug!(path = %path.display(), size = bytes.len(), "Saved screenshot");
        Ok(path)
    }

    // ─── Console operations beyond the command set ────────────────────

    /// Name and refresh time of the active instrument tab.
    pub async fn active_tab(&self) -> Result<ActiveTab> {
        let page = self.page()?;
        let text = page.inner_text(ACTIVE_TAB).await?;
        Ok(ActiveTab::parse(text.trim()))
    }

    /// Bring the named instrument tab to the front. No-op when it already
    /// is.
    pub async fn click_tab(&self, name: &str) -> Result<()> {
        let current = self.active_tab().await?;
        if current.name == name {
            debug!(tab = name, "Tab already active");
            return Ok(());
        }
        let page = self.page()?;
        page.click_text_in(TAB_HEADER, name, 1_000).await
    }

    /// Click an order button by its caption ("Buy Mkt", "Sell Mkt",
    /// "Buy Bid", "Sell Ask"), then give the console a moment to settle.
    pub async fn trade_action(&self, caption: &str) -> Result<()> {
        let page = self.page()?;
        info!(action = caption, "Clicking trade action");
        page.click_by_text(caption).await?;
        tokio::time::sleep(std::time::Duration::from_secs(self.config.trade_settle_secs))
            .await;
        Ok(())
    }

    /// Poll the notification ticker until it reports an order verdict.
    /// Clock readings are skipped; unknown text is surfaced, not guessed.
    pub async fn trade_status(&self) -> Result<TradeStatus> {
        let page = self.page()?;
        let rejected = self.labels.text("rejected");
        let filled = self.labels.text("filled");
        loop {
            let text = page.inner_text(NOTIFICATION_TICKER).await?;
            match classify(&text, &rejected, &filled) {
                NotificationKind::Clock => {
                    tokio::time::sleep(std::time::Duration::from_secs(
                        self.config.notification_poll_secs,
                    ))
                    .await;
                }
                NotificationKind::Status(status) => {
                    info!(status = %status, text = %text, "Order verdict");
                    return Ok(status);
                }
                NotificationKind::Unrecognized => {
                    return Err(Error::UnmodeledState(format!(
                        "notification text: {}",
                        text
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl ConsoleDriver for TradingConsole {
    async fn open(&mut self) -> Result<String> {
        if self.session.is_some() {
            return Err(Error::Session("Browser session already open".to_string()));
        }
        // Credentials are checked before any browser is launched.
        let (username, password) = Self::credentials()?;

        match self.open_inner(&username, &password).await {
            Ok(msg) => Ok(msg),
            Err(e) => {
                error!("Open failed: {}", e);
                self.teardown().await;
                Err(e)
            }
        }
    }

    async fn market_data(&mut self) -> Result<MarketSnapshot> {
        let page = self.page()?;
        let blocks = page.child_block_texts(QUOTE_PANEL).await?;
        let snapshot = self.snapshot_from_blocks(blocks)?;
        debug!(
            code = %snapshot.future_code,
            last = snapshot.last_price,
            "Read market data"
        );
        Ok(snapshot)
    }

    async fn chart_screenshot(&mut self) -> Result<Vec<u8>> {
        let page = self.page()?;
        let bytes = page.screenshot_element(&self.config.chart_selector).await?;
        self.save_media("chart", &bytes)?;
        Ok(bytes)
    }

    async fn close(&mut self) -> Result<String> {
        match self.session.take() {
            Some(mut session) => {
                session.close().await;
                info!("Browser session closed");
            }
            None => {
                debug!("Close with no open session");
            }
        }
        Ok("Browser closed".to_string())
    }
}

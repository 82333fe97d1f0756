use tradepilot_browser::chrome::find_chrome_binary;
use tradepilot_core::{Config, Paths, UiText};

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();

    println!("tradepilot status");
    println!("=================");
    println!();

    // Config
    let config_path = paths.config_file();
    let config_exists = config_path.exists();
    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_exists { "✓" } else { "✗ (not found, using defaults)" }
    );

    // Base directory
    println!(
        "Base dir:  {} {}",
        paths.base.display(),
        if paths.base.exists() { "✓" } else { "✗ (created on open)" }
    );
    println!("Profile:   {}", paths.profile_dir().display());
    println!("Media:     {}", paths.media_dir().display());
    println!("Templates: {}", paths.templates_dir().display());
    println!();

    let config = Config::load_or_default(&paths)?;

    println!("Target URL:   {}", config.target_url);
    println!("UI language:  {}", config.ui_language);
    println!("Headless:     {}", config.headless);
    println!(
        "Environment:  {}",
        if config.live_mode { "live" } else { "simulation" }
    );
    println!("Template:     {}", config.template_file);
    println!();

    // Browser binary
    match find_chrome_binary(config.browser.binary_path.as_deref()) {
        Some(binary) => println!("Browser:   {} ✓", binary),
        None => println!("Browser:   ✗ not found (set browser.binaryPath in config)"),
    }

    // Credentials come from the environment, never from config
    let username_set = std::env::var("TRADER_USERNAME").is_ok_and(|v| !v.is_empty());
    let password_set = std::env::var("TRADER_PASSWORD").is_ok_and(|v| !v.is_empty());
    println!(
        "Login:     TRADER_USERNAME {} / TRADER_PASSWORD {}",
        if username_set { "✓" } else { "✗ not set" },
        if password_set { "✓" } else { "✗ not set" },
    );
    println!();

    // Configured UI languages
    let ui_text = UiText::load_or_default(&paths, &config.ui_language)?;
    let mut languages = ui_text.language_names();
    languages.sort();
    println!("Languages: {} (active: {})", languages.join(", "), ui_text.language());

    Ok(())
}

//! `parley config`: Configuration management commands.

use parley_config::AppConfig;

pub fn show() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    println!("{}", render_redacted(&config)?);
    Ok(())
}

pub fn path() {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
}

pub fn validate() -> anyhow::Result<()> {
    println!("🔍 Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    let warnings: Vec<String> = config
        .bots
        .iter()
        .filter(|b| b.service.api_key.is_none())
        .map(|b| format!("Bot '{}' has no API key (set PARLEY_API_KEY or ANTHROPIC_API_KEY)", b.name))
        .collect();

    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Default bot: {}", config.default_bot_name);
    for bot in &config.bots {
        println!(
            "   Bot:         {} ({} / {})",
            bot.name, bot.service.service_type, bot.service.default_model
        );
    }

    Ok(())
}

/// The configuration as TOML with every API key masked.
fn render_redacted(config: &AppConfig) -> anyhow::Result<String> {
    let mut config = config.clone();
    for bot in &mut config.bots {
        if bot.service.api_key.is_some() {
            bot.service.api_key = Some("[REDACTED]".into());
        }
    }
    Ok(toml::to_string_pretty(&config)?)
}

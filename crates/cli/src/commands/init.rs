//! `parley init`: write a default configuration file.

use parley_config::AppConfig;

pub fn run() -> anyhow::Result<()> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete it and re-run `parley init`.");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!();
    println!("📝 Next steps:");
    println!("   1. Add your API key to {} (or set ANTHROPIC_API_KEY)", config_path.display());
    println!("   2. Run: parley chat -m \"Hello\"");

    Ok(())
}

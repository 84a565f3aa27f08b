//! `docchat init` — First-time setup.

use docchat_config::AppConfig;

pub fn run(force: bool) -> anyhow::Result<()> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("DocChat — First-Time Setup");
    println!("==========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() && !force {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or re-run with --force.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Wrote config.toml at: {}", config_path.display());

    println!("\n📝 Next steps:");
    println!(
        "   1. export {}='your-api-key'",
        docchat_config::API_KEY_ENV
    );
    println!("   2. docchat register <username>");
    println!("   3. docchat chat      (terminal)");
    println!("      docchat serve     (HTTP API)\n");

    Ok(())
}

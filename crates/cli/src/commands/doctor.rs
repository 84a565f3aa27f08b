//! `docchat doctor` — Diagnose configuration, credentials and storage.

use docchat_config::AppConfig;
use docchat_core::{GenerationService, UserRepository};

pub async fn run(online: bool) -> anyhow::Result<()> {
    println!("🩺 DocChat Doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ✅ Config file found: {}", config_path.display());
    } else {
        println!(
            "  ⚠️  No config file at {}, using defaults. Run `docchat init` to create one.",
            config_path.display()
        );
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid (model: {})", config.generation.model);
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Cannot continue without a valid config.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ API key configured");
    } else {
        println!(
            "  ❌ No API key: export {}='...' or set api_key in config.toml",
            docchat_config::API_KEY_ENV
        );
        issues += 1;
    }

    match super::open_store(&config).await {
        Ok(store) => match store.user_count().await {
            Ok(n) => println!("  ✅ Database reachable ({n} user(s)) at {}", config.database_url()),
            Err(e) => {
                println!("  ❌ Database query failed: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ {e:#}");
            issues += 1;
        }
    }

    if online && config.has_api_key() {
        match super::build_generator(&config) {
            Ok(client) => match client.health_check().await {
                Ok(true) => println!("  ✅ Generation service reachable ({})", client.model()),
                Ok(false) => {
                    println!("  ❌ Generation service rejected the model '{}'", client.model());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Generation service check failed: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Could not build generation client: {e:#}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}

//! `docchat serve` — Start the HTTP API server.

use std::sync::Arc;

use anyhow::Context;

pub async fn run(port_override: Option<u16>, host_override: Option<String>) -> anyhow::Result<()> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
        config.validate()?;
    }

    if !config.has_api_key() {
        super::print_missing_key_help();
    }
    let controller = Arc::new(super::build_controller(&config).await?);

    println!("DocChat Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.generation.model);
    println!("   Database:  {}", config.database_url());

    docchat_gateway::start(config, controller)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("Gateway stopped with an error")?;

    Ok(())
}

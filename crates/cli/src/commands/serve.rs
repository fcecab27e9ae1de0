//! `repolens serve`: Start the HTTP API server.

use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        super::load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    println!("🔎 repolens gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.llm.model);
    if config.gateway.allowed_origins.is_empty() {
        println!("   CORS:      same-origin only");
    } else {
        println!("   CORS:      {}", config.gateway.allowed_origins.join(", "));
    }

    repolens_gateway::start(config).await?;

    Ok(())
}

//! `colloquy models`. Show what the service offers for each endpoint.

use colloquy_config::AppConfig;
use colloquy_providers::{CapabilityRegistry, CohereClient, Endpoint};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let client = CohereClient::from_config(&config).await?;

    println!("Endpoints");
    println!("=========");
    println!();
    for line in render(client.registry()) {
        println!("{line}");
    }
    Ok(())
}

/// One line per endpoint: its default model and how many models it offers.
fn render(registry: &CapabilityRegistry) -> Vec<String> {
    Endpoint::ALL
        .into_iter()
        .map(|endpoint| {
            if !registry.is_available(endpoint) {
                return format!("  {:<10} not offered by the service", endpoint.as_str());
            }
            let offered = registry.available_models(endpoint).map_or(0, |m| m.len());
            let default = registry.default_model(endpoint).unwrap_or("(unresolved)");
            format!("  {:<10} default {default}, {offered} models available", endpoint.as_str())
        })
        .collect()
}

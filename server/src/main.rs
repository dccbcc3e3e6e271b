//! econban Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use anyhow::Result;
use econban_observability::logging_initialisieren;
use econban_server::{config::EconbanConfig, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("ECONBAN_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = EconbanConfig::laden(&config_pfad)?;

    logging_initialisieren(&config.logging.level, &config.logging.format)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        server = config.econ.adressen.len(),
        "econban Server wird initialisiert"
    );

    Server::neu(config).starten().await
}

//! Structured Logging Setup via tracing-subscriber
//!
//! Die Werte aus der Konfiguration koennen per Umgebungsvariable
//! ueberschrieben werden:
//! - `ECONBAN_LOG_LEVEL`: Filter (`info`, `debug`, `info,econban_broker=trace`, ...)
//! - `ECONBAN_LOG_FORMAT`: `text` oder `json`

use std::str::FromStr;

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "ECONBAN_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "ECONBAN_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            anders => Err(format!("unbekanntes Log-Format '{anders}' (text oder json)")),
        }
    }
}

/// Initialisiert das globale Logging.
///
/// `ECONBAN_LOG_LEVEL` / `ECONBAN_LOG_FORMAT` haben Vorrang vor den
/// uebergebenen Werten. Schlaegt fehl, wenn bereits ein Subscriber
/// installiert ist.
pub fn logging_initialisieren(level: &str, format: &str) -> Result<()> {
    let level = std::env::var(ENV_LOG_LEVEL).unwrap_or_else(|_| level.to_string());
    let format = std::env::var(ENV_LOG_FORMAT).unwrap_or_else(|_| format.to_string());

    let filter = EnvFilter::try_new(&level)
        .map_err(|e| anyhow!("ungueltiger Log-Filter '{level}': {e}"))?;
    let format = LogFormat::from_str(&format).map_err(|e| anyhow!(e))?;

    match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    }
    .map_err(|e| anyhow!("Logging bereits initialisiert: {e}"))
}

/// Validiert einen einfachen Log-Level-String
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert einen Filter-String im `EnvFilter`-Format
pub fn log_filter_gueltig(filter: &str) -> bool {
    !filter.trim().is_empty() && EnvFilter::try_new(filter).is_ok()
}

pub fn log_format_gueltig(format: &str) -> bool {
    LogFormat::from_str(format).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_gueltige_werte() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(log_level_gueltig(level));
        }
        assert!(!log_level_gueltig("verbose"));
        assert!(!log_level_gueltig("INFO"));
        assert!(!log_level_gueltig(""));
    }

    #[test]
    fn log_filter_mit_direktiven() {
        assert!(log_filter_gueltig("info"));
        assert!(log_filter_gueltig("info,econban_broker=trace"));
        assert!(!log_filter_gueltig(""));
        assert!(!log_filter_gueltig("   "));
    }

    #[test]
    fn log_format_parsen() {
        assert_eq!("text".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!(!log_format_gueltig("JSON"));
        assert!(!log_format_gueltig("xml"));
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }
}

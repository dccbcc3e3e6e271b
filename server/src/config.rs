//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! Standardwerte, Pflicht sind nur die econ-Adressen und -Passwoerter.
//! Dauern werden als lesbare Strings angegeben (`"10s"`, `"24h"`).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use econban_broker::{BanVorgaben, BrokerKonfig};
use econban_core::{EconbanError, ServerAdresse};
use econban_observability::logging::{log_filter_gueltig, log_format_gueltig};
use serde::{Deserialize, Serialize};

const MINDEST_BANDAUER: Duration = Duration::from_secs(60);

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EconbanConfig {
    pub econ: EconEinstellungen,
    pub blacklists: BlacklistEinstellungen,
    pub bans: BanEinstellungen,
    pub logging: LoggingEinstellungen,
}

/// econ-Verbindungen zu den Game-Servern
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconEinstellungen {
    /// `host:port` der econ-Schnittstellen
    pub adressen: Vec<String>,
    /// Ein Passwort pro Adresse oder genau eines fuer alle
    pub passwoerter: Vec<String>,
    /// Pause zwischen zwei Verbindungsversuchen
    #[serde(with = "dauer")]
    pub reconnect_verzoegerung: Duration,
    /// Gesamtzeit, nach der ein Server beim Start aufgegeben wird
    #[serde(with = "dauer")]
    pub reconnect_timeout: Duration,
    /// Zeitlimit fuer Verbindungsaufbau und Anmeldung
    #[serde(with = "dauer")]
    pub verbindungs_timeout: Duration,
}

impl Default for EconEinstellungen {
    fn default() -> Self {
        Self {
            adressen: vec![],
            passwoerter: vec![],
            reconnect_verzoegerung: Duration::from_secs(10),
            reconnect_timeout: Duration::from_secs(24 * 60 * 60),
            verbindungs_timeout: Duration::from_secs(10),
        }
    }
}

/// Blacklist-Dateien
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlacklistEinstellungen {
    /// Dateien mit IP-Adressen und CIDR-Netzen
    pub ip: Vec<PathBuf>,
    /// Dateien mit regulaeren Ausdruecken fuer Chat-Nachrichten
    pub chat: Vec<PathBuf>,
}

/// Ban-Verhalten
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BanEinstellungen {
    pub propagieren: bool,
    #[serde(with = "dauer")]
    pub permaban_dauer: Duration,
    pub permaban_grund: String,
    #[serde(with = "dauer")]
    pub chatban_dauer: Duration,
    pub chatban_grund: String,
}

impl Default for BanEinstellungen {
    fn default() -> Self {
        let standard = BrokerKonfig::default();
        Self {
            propagieren: standard.propagieren,
            permaban_dauer: standard.permaban.dauer,
            permaban_grund: standard.permaban.grund,
            chatban_dauer: standard.chatban.dauer,
            chatban_grund: standard.chatban.grund,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Filter im `EnvFilter`-Format, z.B. "info" oder "info,econban_broker=debug"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// serde-Helfer fuer Dauern im humantime-Format
mod dauer {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dauer: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*dauer).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(d)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

fn konfig_fehler(msg: impl Into<String>) -> EconbanError {
    EconbanError::Konfiguration(msg.into())
}

fn datei_muss_existieren(art: &str, pfad: &Path) -> Result<(), EconbanError> {
    let meta = std::fs::metadata(pfad).map_err(|e| {
        konfig_fehler(format!("{art}-Blacklist '{}' nicht lesbar: {e}", pfad.display()))
    })?;
    if !meta.is_file() {
        return Err(konfig_fehler(format!(
            "{art}-Blacklist '{}' ist keine regulaere Datei",
            pfad.display()
        )));
    }
    Ok(())
}

impl EconbanConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}")),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    pub fn aus_toml(inhalt: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(inhalt)?)
    }

    /// Prueft die Konfiguration auf Vollstaendigkeit und Sinnhaftigkeit
    pub fn validieren(&self) -> Result<(), EconbanError> {
        let bans = &self.bans;
        if bans.permaban_dauer < MINDEST_BANDAUER {
            return Err(konfig_fehler("permaban_dauer muss mindestens 1m sein"));
        }
        if bans.permaban_grund.trim().is_empty() {
            return Err(konfig_fehler("permaban_grund darf nicht leer sein"));
        }
        if bans.chatban_dauer < MINDEST_BANDAUER {
            return Err(konfig_fehler("chatban_dauer muss mindestens 1m sein"));
        }
        if bans.chatban_grund.trim().is_empty() {
            return Err(konfig_fehler("chatban_grund darf nicht leer sein"));
        }

        let econ = &self.econ;
        if econ.adressen.is_empty() {
            return Err(konfig_fehler("econ.adressen darf nicht leer sein"));
        }
        let mut gesehen = HashSet::new();
        for adresse in &econ.adressen {
            if adresse.trim().is_empty() {
                return Err(konfig_fehler("leere econ-Adresse"));
            }
            if !gesehen.insert(adresse.trim()) {
                return Err(konfig_fehler(format!("econ-Adresse {adresse} ist doppelt")));
            }
        }
        if econ.passwoerter.is_empty() {
            return Err(konfig_fehler("econ.passwoerter darf nicht leer sein"));
        }
        if econ.passwoerter.len() != 1 && econ.passwoerter.len() != econ.adressen.len() {
            return Err(konfig_fehler(format!(
                "{} Passwoerter fuer {} Adressen: entweder ein Passwort fuer alle oder eines pro Adresse",
                econ.passwoerter.len(),
                econ.adressen.len()
            )));
        }
        if econ.verbindungs_timeout.is_zero() {
            return Err(konfig_fehler("verbindungs_timeout muss groesser als 0 sein"));
        }

        for pfad in &self.blacklists.ip {
            datei_muss_existieren("IP", pfad)?;
        }
        for pfad in &self.blacklists.chat {
            datei_muss_existieren("Chat", pfad)?;
        }

        let hat_blacklists = !self.blacklists.ip.is_empty() || !self.blacklists.chat.is_empty();
        if !bans.propagieren && !hat_blacklists {
            return Err(konfig_fehler(
                "sinnlose Konfiguration: weder Propagation noch Blacklists aktiv",
            ));
        }
        if bans.propagieren && !hat_blacklists && econ.adressen.len() < 2 {
            return Err(konfig_fehler(
                "sinnlose Konfiguration: Propagation braucht mindestens zwei Server",
            ));
        }

        if !log_filter_gueltig(&self.logging.level) {
            return Err(konfig_fehler(format!(
                "ungueltiger Log-Level '{}'",
                self.logging.level
            )));
        }
        if !log_format_gueltig(&self.logging.format) {
            return Err(konfig_fehler(format!(
                "ungueltiges Log-Format '{}'",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Adresse und Passwort je Server; ein einzelnes Passwort gilt fuer alle
    pub fn econ_ziele(&self) -> Vec<(ServerAdresse, String)> {
        let passwoerter = &self.econ.passwoerter;
        self.econ
            .adressen
            .iter()
            .enumerate()
            .filter_map(|(i, adresse)| {
                let passwort = match passwoerter.len() {
                    1 => passwoerter.first(),
                    _ => passwoerter.get(i),
                }?;
                Some((ServerAdresse::neu(adresse.trim()), passwort.clone()))
            })
            .collect()
    }

    pub fn broker_konfig(&self) -> BrokerKonfig {
        BrokerKonfig {
            propagieren: self.bans.propagieren,
            permaban: BanVorgaben::neu(self.bans.permaban_dauer, self.bans.permaban_grund.clone()),
            chatban: BanVorgaben::neu(self.bans.chatban_dauer, self.bans.chatban_grund.clone()),
        }
    }
}

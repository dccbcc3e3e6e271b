//! IP-Blacklist – Zulassungspruefung beim Betreten eines Servers
//!
//! Netze kommen aus Blacklist-Dateien oder zur Laufzeit per API.
//! Dateiformat: ein Eintrag pro Zeile, fuehrende Leerzeichen und alles
//! nach dem Adress-Token werden ignoriert, unlesbare Zeilen uebersprungen.
//!
//! ```text
//! 10.0.0.0/8        # Rechenzentrum
//! 192.168.1.7
//! 2001:db8::/32
//! ```

use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;

use econban_core::{EconbanError, Result};
use ipnet::IpNet;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;

use crate::cidr::CidrTrie;

static ADRESS_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([0-9.:a-fA-F\-/]+)").expect("gueltiges Muster"));

/// Parst ein CIDR-Netz oder eine einzelne Adresse (-> /32 bzw. /128)
pub fn netz_parsen(text: &str) -> Result<IpNet> {
    let text = text.trim();
    if text.contains('/') {
        return IpNet::from_str(text)
            .map_err(|e| EconbanError::parse(format!("ungueltiges CIDR-Netz '{text}': {e}")));
    }
    IpAddr::from_str(text)
        .map(IpNet::from)
        .map_err(|e| EconbanError::parse(format!("ungueltige IP-Adresse '{text}': {e}")))
}

/// Parst eine IP wie sie im econ-Log steht (IPv6 in eckigen Klammern)
pub fn log_ip_parsen(ip: &str) -> Result<IpAddr> {
    let ohne_klammern = ip.trim_start_matches('[').trim_end_matches(']');
    IpAddr::from_str(ohne_klammern)
        .map_err(|e| EconbanError::parse(format!("ungueltige IP-Adresse '{ip}': {e}")))
}

fn zeile_parsen(zeile: &str) -> Option<IpNet> {
    let token = ADRESS_TOKEN.captures(zeile)?.get(1)?.as_str();
    netz_parsen(token).ok()
}

/// Thread-sichere Menge gebannter Netze
#[derive(Debug, Default)]
pub struct IpBlacklist {
    trie: RwLock<CidrTrie>,
}

impl IpBlacklist {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn cidr_hinzufuegen(&self, cidr: &str) -> Result<()> {
        let netz = netz_parsen(cidr)?;
        self.trie.write().einfuegen(netz);
        Ok(())
    }

    /// Entfernt genau dieses Netz; `Ok(false)` wenn es nicht gespeichert war
    pub fn cidr_entfernen(&self, cidr: &str) -> Result<bool> {
        let netz = netz_parsen(cidr)?;
        Ok(self.trie.write().entfernen(netz))
    }

    /// Prueft eine IP aus dem Log gegen alle gespeicherten Netze
    pub fn ist_gebannt(&self, ip: &str) -> Result<bool> {
        let ip = log_ip_parsen(ip)?;
        Ok(self.trie.read().enthaelt(ip))
    }

    /// Laedt eine Blacklist-Datei und gibt die Anzahl gelesener Netze zurueck.
    ///
    /// Alle Netze der Datei werden unter einer einzigen Schreibsperre
    /// eingefuegt.
    pub fn datei_laden(&self, pfad: impl AsRef<Path>) -> Result<usize> {
        let pfad = pfad.as_ref();
        let inhalt = std::fs::read_to_string(pfad)?;

        let netze: Vec<IpNet> = inhalt.lines().filter_map(zeile_parsen).collect();
        if netze.is_empty() {
            tracing::warn!(datei = %pfad.display(), "Keine Netze in IP-Blacklist gefunden");
            return Ok(0);
        }

        {
            let mut trie = self.trie.write();
            for netz in &netze {
                trie.einfuegen(*netz);
            }
        }

        tracing::info!(
            datei = %pfad.display(),
            anzahl = netze.len(),
            "IP-Blacklist geladen"
        );
        Ok(netze.len())
    }

    pub fn len(&self) -> usize {
        self.trie.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.read().is_empty()
    }
}

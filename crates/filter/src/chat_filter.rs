//! Chat-Filter – verbotene Nachrichten als regulaere Ausdruecke
//!
//! Dateiformat: ein Muster pro Zeile, Leerzeilen und `#`-Kommentare werden
//! uebersprungen, doppelte Zeilen innerhalb einer Datei zusammengefasst.
//! Die Reihenfolge bleibt erhalten, das erste passende Muster gewinnt.

use std::collections::HashSet;
use std::path::Path;

use econban_core::{EconbanError, Result};
use parking_lot::RwLock;
use regex::Regex;

#[derive(Debug, Default)]
pub struct ChatFilter {
    muster: RwLock<Vec<Regex>>,
}

impl ChatFilter {
    pub fn neu() -> Self {
        Self::default()
    }

    fn kompilieren(text: &str) -> Result<Regex> {
        Regex::new(text)
            .map_err(|e| EconbanError::parse(format!("ungueltiges Chat-Muster '{text}': {e}")))
    }

    /// Laedt alle Muster einer Datei.
    ///
    /// Ist ein Muster ungueltig, wird aus dieser Datei nichts uebernommen.
    pub fn datei_laden(&self, pfad: impl AsRef<Path>) -> Result<usize> {
        let pfad = pfad.as_ref();
        let inhalt = std::fs::read_to_string(pfad)?;

        let mut gesehen = HashSet::new();
        let mut neue = Vec::new();
        for zeile in inhalt.lines().map(str::trim) {
            if zeile.is_empty() || zeile.starts_with('#') || !gesehen.insert(zeile) {
                continue;
            }
            neue.push(Self::kompilieren(zeile)?);
        }

        let anzahl = neue.len();
        self.muster.write().extend(neue);

        tracing::info!(datei = %pfad.display(), anzahl, "Chat-Blacklist geladen");
        Ok(anzahl)
    }

    pub fn muster_hinzufuegen(&self, muster: &str) -> Result<()> {
        let re = Self::kompilieren(muster)?;
        self.muster.write().push(re);
        Ok(())
    }

    /// Erstes Muster in Einfuegereihenfolge, das die Nachricht trifft
    pub fn erster_treffer(&self, nachricht: &str) -> Option<Regex> {
        self.muster
            .read()
            .iter()
            .find(|re| re.is_match(nachricht))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.muster.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.muster.read().is_empty()
    }
}

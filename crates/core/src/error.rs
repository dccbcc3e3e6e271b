//! Fehlertypen fuer econban
//!
//! Zentraler Fehler-Enum fuer alle Library-Crates. Programmfehler
//! (z.B. ein unbekannter ausloesender Server waehrend der Propagation)
//! sind bewusst KEINE Variante, sondern fuehren zu einem `panic!`.

use thiserror::Error;

/// Globaler Result-Alias fuer econban
pub type Result<T> = std::result::Result<T, EconbanError>;

/// Alle behandelbaren Fehler im econban-System
#[derive(Debug, Error)]
pub enum EconbanError {
    // --- Verbindung & Transport ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Transportfehler: {0}")]
    Transport(String),

    #[error("Verbindung geschlossen: {0}")]
    Geschlossen(String),

    // --- Eingaben ---
    #[error("Ungueltiges Argument: {0}")]
    UngueltigesArgument(String),

    #[error("Parse-Fehler: {0}")]
    Parse(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Gesammelte Fehler, z.B. beim Schliessen mehrerer Verbindungen
    #[error("{} Fehler: {}", .0.len(), fehler_verbinden(.0))]
    Mehrere(Vec<EconbanError>),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

fn fehler_verbinden(fehler: &[EconbanError]) -> String {
    fehler
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl EconbanError {
    /// Erstellt einen Parse-Fehler aus einer beliebigen Nachricht
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Fasst mehrere Fehler zusammen. `None` wenn die Liste leer ist,
    /// der Fehler selbst wenn es genau einer ist.
    pub fn sammeln(mut fehler: Vec<EconbanError>) -> Option<Self> {
        match fehler.len() {
            0 => None,
            1 => fehler.pop(),
            _ => Some(Self::Mehrere(fehler)),
        }
    }

    /// Gibt true zurueck wenn der Fehler die Pipeline nicht beenden soll
    pub fn ist_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

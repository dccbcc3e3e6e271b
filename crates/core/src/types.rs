//! Gemeinsame Identifikationstypen fuer econban
//!
//! Newtype-Pattern um Server-Adressen und Client-IDs nicht mit
//! beliebigen Strings oder Zahlen zu verwechseln.

use serde::{Deserialize, Serialize};

/// Adresse eines Game-Servers (`host:port` der econ-Schnittstelle).
/// Eindeutiger Schluessel innerhalb der Flotte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerAdresse(pub String);

impl ServerAdresse {
    pub fn neu(adresse: impl Into<String>) -> Self {
        Self(adresse.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServerAdresse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerAdresse {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Client-ID eines Spielers auf einem Game-Server (Slot-Nummer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client:{}", self.0)
    }
}

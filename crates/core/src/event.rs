//! Log-Ereignisse und Klassifizierer-Trait
//!
//! Jede Zeile aus dem Log-Stream eines Game-Servers wird genau einmal
//! klassifiziert. Die konkrete Grammatik (Vanilla/DDNet) steckt im
//! Modul `klassifizierer`, die Verbindungs- und Broker-Schicht kennt nur
//! den Trait.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ClientId;

/// Alle Ereignisse, die aus einer Log-Zeile erkannt werden
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ereignis {
    /// Ein Spieler hat das Spiel betreten
    ClientBetreten {
        client_id: ClientId,
        ip: String,
        port: u16,
    },
    /// Ein Spieler hat den Server verlassen
    ClientGetrennt {
        client_id: ClientId,
        ip: String,
        port: u16,
        grund: String,
    },
    /// Der Server hat eine IP gebannt
    ClientGebannt {
        ip: String,
        dauer: Duration,
        grund: String,
    },
    /// Der Server hat einen Ban aufgehoben
    ClientEntbannt { ip: String },
    /// Chat-Nachricht eines Spielers
    ChatNachricht {
        client_id: ClientId,
        /// -1 = alle, -2 = Team, sonst Whisper-Ziel
        ziel_id: i32,
        nickname: String,
        nachricht: String,
    },
}

/// Klassifiziert eine rohe Log-Zeile.
///
/// Muss eine reine, totale Funktion des Zeilentexts sein: gleiche Zeile,
/// gleiches Ergebnis, kein Panic.
pub trait Klassifizierer: Send + Sync + 'static {
    fn klassifizieren(&self, zeile: &str) -> Option<Ereignis>;
}

impl<F> Klassifizierer for F
where
    F: Fn(&str) -> Option<Ereignis> + Send + Sync + 'static,
{
    fn klassifizieren(&self, zeile: &str) -> Option<Ereignis> {
        self(zeile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ereignis_ist_serde_kompatibel() {
        let event = Ereignis::ClientGebannt {
            ip: "1.2.3.4".into(),
            dauer: Duration::from_secs(60),
            grund: "test".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let zurueck: Ereignis = serde_json::from_str(&json).unwrap();
        assert_eq!(zurueck, event);
    }

    #[test]
    fn closure_als_klassifizierer() {
        let k = |zeile: &str| {
            (zeile == "x").then(|| Ereignis::ClientEntbannt { ip: "1.1.1.1".into() })
        };
        assert!(k.klassifizieren("x").is_some());
        assert!(k.klassifizieren("y").is_none());
    }
}

//! Ban-Vorgaben des Brokers

use std::time::Duration;

/// Dauer und Grund fuer automatisch ausgeloeste Bans
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanVorgaben {
    pub dauer: Duration,
    pub grund: String,
}

impl BanVorgaben {
    pub fn neu(dauer: Duration, grund: impl Into<String>) -> Self {
        Self {
            dauer,
            grund: grund.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerKonfig {
    /// Bans und Unbans eines Servers auf alle anderen uebertragen
    pub propagieren: bool,
    /// Ban fuer Blacklist-IPs beim Betreten
    pub permaban: BanVorgaben,
    /// Ban fuer verbotene Chat-Nachrichten
    pub chatban: BanVorgaben,
}

impl Default for BrokerKonfig {
    fn default() -> Self {
        Self {
            propagieren: true,
            permaban: BanVorgaben::neu(Duration::from_secs(24 * 60 * 60), "permanently banned"),
            chatban: BanVorgaben::neu(
                Duration::from_secs(24 * 60 * 60),
                "prohibited chat message",
            ),
        }
    }
}

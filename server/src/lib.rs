//! econban-server – Bibliotheks-Root
//!
//! Baut aus der Konfiguration den Broker, laedt die Blacklists, verbindet
//! sich mit allen Game-Servern und laeuft bis Ctrl-C / SIGTERM.

pub mod config;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use config::EconbanConfig;
use econban_broker::Broker;
use econban_core::{EconbanError, TeeworldsKlassifizierer};
use econban_econ::TcpVerbinder;
use tokio::time::Instant;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: EconbanConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: EconbanConfig) -> Self {
        Self { config }
    }

    /// Startet den Ban-Server und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Konfiguration pruefen
    /// 2. IP- und Chat-Blacklists laden
    /// 3. Mit allen Game-Servern verbinden (mit Wiederholung)
    /// 4. Auf Ctrl-C / SIGTERM warten
    /// 5. Alle Verbindungen schliessen
    pub async fn starten(self) -> Result<()> {
        self.config.validieren()?;

        let broker = Broker::neu(
            self.config.broker_konfig(),
            Arc::new(TcpVerbinder::neu(self.config.econ.verbindungs_timeout)),
            Arc::new(TeeworldsKlassifizierer),
        );

        let ergebnis = self.ausfuehren(&broker).await;

        tracing::info!("Ban-Server wird beendet");
        let geschlossen = broker.schliessen().await;

        match (ergebnis, geschlossen) {
            (Ok(()), Ok(())) => {
                tracing::info!("Ban-Server sauber beendet");
                Ok(())
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(s)) => Err(s.into()),
            (Err(e), Err(s)) => Err(e.context(format!("zusaetzlich beim Schliessen: {s}"))),
        }
    }

    async fn ausfuehren(&self, broker: &Broker) -> Result<()> {
        for pfad in &self.config.blacklists.ip {
            broker.cidr_blacklist_laden(pfad)?;
        }
        for pfad in &self.config.blacklists.chat {
            broker.chat_blacklist_laden(pfad)?;
        }

        tokio::select! {
            ergebnis = self.alle_verbinden(broker) => ergebnis?,
            signal = shutdown_signal() => {
                signal?;
                tracing::info!("Shutdown-Signal waehrend des Verbindungsaufbaus");
                return Ok(());
            }
        }

        tracing::info!(
            server = broker.server_adressen().len(),
            ip_netze = broker.ip_blacklist().len(),
            chat_muster = broker.chat_filter().len(),
            propagieren = self.config.bans.propagieren,
            "Ban-Server laeuft. Warte auf Shutdown-Signal (Ctrl-C / SIGTERM)..."
        );
        shutdown_signal().await?;
        tracing::info!("Shutdown-Signal empfangen");
        Ok(())
    }

    async fn alle_verbinden(&self, broker: &Broker) -> Result<()> {
        let econ = &self.config.econ;
        for (adresse, passwort) in self.config.econ_ziele() {
            let passwort = passwort.as_str();
            mit_wiederholung(econ.reconnect_verzoegerung, econ.reconnect_timeout, || {
                broker.verbinden_mit(adresse.clone(), passwort)
            })
            .await
            .map_err(|e| anyhow::anyhow!("Verbindung zu {adresse} fehlgeschlagen: {e}"))?;
        }
        Ok(())
    }
}

/// Wiederholt einen Verbindungsversuch alle `verzoegerung`, bis er gelingt
/// oder `timeout` verstrichen ist. Gibt dann den letzten Fehler zurueck.
///
/// `UngueltigesArgument` wird nicht wiederholt.
pub async fn mit_wiederholung<T, F, Fut>(
    verzoegerung: Duration,
    timeout: Duration,
    mut versuch: F,
) -> econban_core::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = econban_core::Result<T>>,
{
    let start = Instant::now();
    let mut nummer: u32 = 1;

    loop {
        match versuch().await {
            Ok(wert) => return Ok(wert),
            Err(e @ EconbanError::UngueltigesArgument(_)) => return Err(e),
            Err(e) => {
                if start.elapsed() + verzoegerung > timeout {
                    return Err(e);
                }
                tracing::warn!(
                    versuch = nummer,
                    fehler = %e,
                    verzoegerung = ?verzoegerung,
                    "Verbindungsversuch fehlgeschlagen, neuer Versuch folgt"
                );
                tokio::time::sleep(verzoegerung).await;
                nummer += 1;
            }
        }
    }
}

/// Wartet auf Ctrl-C oder SIGTERM
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            ergebnis = tokio::signal::ctrl_c() => ergebnis,
            _ = sigterm.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

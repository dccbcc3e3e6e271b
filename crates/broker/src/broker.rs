//! Broker – verwaltet alle econ-Verbindungen und reagiert auf ihre Logs
//!
//! ## Ereignisse
//! - `ClientBetreten`: IP gegen die Blacklist pruefen, ggf. nur auf diesem
//!   Server bannen
//! - `ClientGebannt` / `ClientEntbannt`: auf die anderen Server uebertragen
//!   (siehe `propagation`)
//! - `ChatNachricht`: bei verbotenem Inhalt auf allen Servern bannen
//! - `ClientGetrennt`: nur Logging

use std::path::Path;
use std::sync::{Arc, Weak};

use econban_core::{ClientId, EconbanError, Ereignis, Klassifizierer, Result, ServerAdresse};
use econban_econ::{EconVerbindung, Verbinder, ZeilenHandler};
use econban_filter::{ChatFilter, IpBlacklist};
use parking_lot::{Mutex, RwLock};

use crate::konfig::BrokerKonfig;
use crate::register::ServerRegister;

pub struct Broker {
    selbst: Weak<Broker>,
    pub(crate) konfig: BrokerKonfig,
    verbinder: Arc<dyn Verbinder>,
    klassifizierer: Arc<dyn Klassifizierer>,
    pub(crate) register: RwLock<ServerRegister>,
    /// Serialisiert Propagations-Entscheidungen ueber alle Verbindungen
    pub(crate) propagation: Mutex<()>,
    ip_blacklist: IpBlacklist,
    chat_filter: ChatFilter,
}

/// Zeilen-Handler, den jede Verbindung bekommt. Haelt den Broker nur
/// schwach, damit Broker und Verbindungen keinen Zyklus bilden.
struct BrokerHandle(Weak<Broker>);

impl ZeilenHandler for BrokerHandle {
    fn zeile_behandeln(&self, verbindung: &Arc<EconVerbindung>, zeile: &str) {
        if let Some(broker) = self.0.upgrade() {
            broker.zeile_behandeln(verbindung, zeile);
        }
    }
}

impl Broker {
    pub fn neu(
        konfig: BrokerKonfig,
        verbinder: Arc<dyn Verbinder>,
        klassifizierer: Arc<dyn Klassifizierer>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|selbst| Self {
            selbst: selbst.clone(),
            konfig,
            verbinder,
            klassifizierer,
            register: RwLock::new(ServerRegister::default()),
            propagation: Mutex::new(()),
            ip_blacklist: IpBlacklist::neu(),
            chat_filter: ChatFilter::neu(),
        })
    }

    pub fn konfig(&self) -> &BrokerKonfig {
        &self.konfig
    }

    pub fn ip_blacklist(&self) -> &IpBlacklist {
        &self.ip_blacklist
    }

    pub fn chat_filter(&self) -> &ChatFilter {
        &self.chat_filter
    }

    /// Adressen aller registrierten Server, sortiert
    pub fn server_adressen(&self) -> Vec<ServerAdresse> {
        self.register.read().adressen()
    }

    pub fn verbindung(&self, adresse: &ServerAdresse) -> Option<Arc<EconVerbindung>> {
        self.register.read().get(adresse).cloned()
    }

    // -----------------------------------------------------------------------
    // Verbindungen
    // -----------------------------------------------------------------------

    /// Verbindet sich mit einem Game-Server und nimmt ihn ins Register auf
    pub async fn verbinden_mit(&self, adresse: ServerAdresse, passwort: &str) -> Result<()> {
        if self.register.read().enthaelt(&adresse) {
            return Err(EconbanError::UngueltigesArgument(format!(
                "Server {adresse} ist bereits verbunden"
            )));
        }

        tracing::info!(server = %adresse, "Verbinde mit Server");
        let verbindung = EconVerbindung::verbinden(
            self.verbinder.as_ref(),
            adresse.clone(),
            passwort,
            Arc::new(BrokerHandle(self.selbst.clone())),
            Arc::clone(&self.klassifizierer),
        )
        .await?;

        let doppelt = {
            let mut register = self.register.write();
            if register.enthaelt(&adresse) {
                true
            } else {
                register.einfuegen(Arc::clone(&verbindung));
                false
            }
        };

        if doppelt {
            if let Err(e) = verbindung.schliessen().await {
                tracing::debug!(server = %adresse, fehler = %e, "Doppelte Verbindung geschlossen");
            }
            return Err(EconbanError::UngueltigesArgument(format!(
                "Server {adresse} ist bereits verbunden"
            )));
        }

        tracing::info!(server = %adresse, "Mit Server verbunden");
        Ok(())
    }

    /// Schliesst alle Verbindungen und sammelt deren Fehler
    pub async fn schliessen(&self) -> Result<()> {
        let verbindungen = self.register.write().alle_entnehmen();

        let mut fehler = Vec::new();
        for verbindung in verbindungen {
            if let Err(e) = verbindung.schliessen().await {
                tracing::warn!(server = %verbindung.adresse(), fehler = %e, "Fehler beim Schliessen");
                fehler.push(e);
            }
        }

        match EconbanError::sammeln(fehler) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Blacklists
    // -----------------------------------------------------------------------

    pub fn cidr_blacklist_laden(&self, pfad: impl AsRef<Path>) -> Result<usize> {
        self.ip_blacklist.datei_laden(pfad)
    }

    pub fn chat_blacklist_laden(&self, pfad: impl AsRef<Path>) -> Result<usize> {
        self.chat_filter.datei_laden(pfad)
    }

    // -----------------------------------------------------------------------
    // Ereignisse
    // -----------------------------------------------------------------------

    /// Klassifiziert eine Zeile einmal und leitet sie an genau einen
    /// Ereignis-Handler weiter
    pub fn zeile_behandeln(&self, verbindung: &Arc<EconVerbindung>, zeile: &str) {
        let Some(ereignis) = self.klassifizierer.klassifizieren(zeile) else {
            return;
        };

        // Zeilen vor der Registrierung oder nach dem Schliessen
        if !self.register.read().enthaelt(verbindung.adresse()) {
            tracing::debug!(
                server = %verbindung.adresse(),
                "Ereignis eines nicht registrierten Servers verworfen"
            );
            return;
        }

        match ereignis {
            Ereignis::ChatNachricht {
                client_id,
                nachricht,
                ..
            } => self.chat_behandeln(verbindung, client_id, &nachricht),
            Ereignis::ClientBetreten { ip, .. } => self.betreten_behandeln(verbindung, &ip),
            Ereignis::ClientGetrennt { ip, grund, .. } => {
                tracing::info!(
                    server = %verbindung.adresse(),
                    ip = %ip,
                    grund = %grund,
                    "Client hat den Server verlassen"
                );
            }
            Ereignis::ClientGebannt { ip, dauer, grund } => {
                if !self.konfig.propagieren {
                    return;
                }
                tracing::info!(server = %verbindung.adresse(), ip = %ip, "Ban wird propagiert");
                if let Err(e) = self.auf_anderen_bannen(verbindung.adresse(), &ip, dauer, &grund) {
                    tracing::warn!(
                        server = %verbindung.adresse(),
                        ip = %ip,
                        fehler = %e,
                        "Ban-Propagation fehlgeschlagen"
                    );
                }
            }
            Ereignis::ClientEntbannt { ip } => {
                if !self.konfig.propagieren {
                    return;
                }
                tracing::info!(server = %verbindung.adresse(), ip = %ip, "Unban wird propagiert");
                if let Err(e) = self.auf_anderen_entbannen(verbindung.adresse(), &ip) {
                    tracing::warn!(
                        server = %verbindung.adresse(),
                        ip = %ip,
                        fehler = %e,
                        "Unban-Propagation fehlgeschlagen"
                    );
                }
            }
        }
    }

    fn betreten_behandeln(&self, verbindung: &Arc<EconVerbindung>, ip: &str) {
        let adresse = verbindung.adresse();
        match self.ip_blacklist.ist_gebannt(ip) {
            Err(e) => {
                tracing::warn!(server = %adresse, ip = %ip, fehler = %e, "Blacklist-Pruefung fehlgeschlagen");
            }
            Ok(false) => {
                tracing::info!(server = %adresse, ip = %ip, "Client hat den Server betreten");
            }
            Ok(true) => {
                tracing::info!(server = %adresse, ip = %ip, "Gesperrte IP hat den Server betreten");
                // Nur dieser Server: die anderen bannen die IP beim Betreten selbst
                let _sperre = self.propagation.lock();
                if self.konfig.propagieren {
                    verbindung.ban_propagation_ignorieren(ip, std::slice::from_ref(adresse));
                }
                let vorgaben = &self.konfig.permaban;
                if let Err(e) = verbindung.ip_bannen(adresse, ip, vorgaben.dauer, &vorgaben.grund) {
                    verbindung.ist_ban_propagation_ignoriert(adresse, ip);
                    tracing::warn!(server = %adresse, ip = %ip, fehler = %e, "Zulassungs-Ban fehlgeschlagen");
                }
            }
        }
    }

    fn chat_behandeln(&self, verbindung: &Arc<EconVerbindung>, client_id: ClientId, nachricht: &str) {
        let Some(muster) = self.chat_filter.erster_treffer(nachricht) else {
            return;
        };

        let adresse = verbindung.adresse();
        tracing::info!(
            server = %adresse,
            client = %client_id,
            muster = %muster,
            nachricht = %nachricht,
            "Verbotene Chat-Nachricht"
        );

        let ip = match verbindung.client_ip(client_id) {
            Some(ip) if !ip.is_empty() => ip,
            Some(_) => {
                tracing::warn!(server = %adresse, client = %client_id, "Leere IP fuer Chat-Ban");
                return;
            }
            None => {
                tracing::warn!(server = %adresse, client = %client_id, "Unbekannter Client fuer Chat-Ban");
                return;
            }
        };

        let vorgaben = &self.konfig.chatban;
        if let Err(e) = self.auf_allen_bannen(adresse, &ip, vorgaben.dauer, &vorgaben.grund) {
            tracing::warn!(server = %adresse, ip = %ip, fehler = %e, "Chat-Ban fehlgeschlagen");
        }
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("konfig", &self.konfig)
            .field("server", &self.server_adressen())
            .field("ip_blacklist", &self.ip_blacklist.len())
            .field("chat_filter", &self.chat_filter.len())
            .finish()
    }
}

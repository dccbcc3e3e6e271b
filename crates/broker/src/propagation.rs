//! Ban-Propagation ohne Echo
//!
//! Ein Ban, der auf Server T im Log erscheint, wird an alle anderen
//! Server geschickt. Diese loggen den Ban ihrerseits, was ohne Markierungen
//! eine endlose Welle ausloesen wuerde. Jede Verbindung zaehlt deshalb pro
//! Peer und IP die noch erwarteten Echos.
//!
//! ```text
//! A loggt Ban      -> A zaehlt (B, ip) = 1, (C, ip) = 1; Ban an B und C
//! A loggt erneut   -> (B, ip) = 2, (C, ip) = 2; Ban erneut an B und C
//! B loggt Ban      -> A hat (B, ip): herunterzaehlen, Ende
//! B loggt Ban      -> A hat (B, ip): herunterzaehlen, Ende
//! ```
//!
//! `auf_allen_*` wird fuer Ausloeser ausserhalb der Flotte benutzt (Chat)
//! und markiert vor dem Befehl jeden Server fuer alle anderen.

use std::time::Duration;

use econban_core::{Result, ServerAdresse};
use econban_econ::EconVerbindung;

use crate::broker::Broker;

#[derive(Debug, Clone, Copy)]
enum Aktion<'a> {
    Bannen { dauer: Duration, grund: &'a str },
    Entbannen,
}

impl Aktion<'_> {
    fn name(self) -> &'static str {
        match self {
            Aktion::Bannen { .. } => "Ban",
            Aktion::Entbannen => "Unban",
        }
    }

    fn markieren(self, verbindung: &EconVerbindung, ip: &str, quellen: &[ServerAdresse]) {
        match self {
            Aktion::Bannen { .. } => verbindung.ban_propagation_ignorieren(ip, quellen),
            Aktion::Entbannen => verbindung.unban_propagation_ignorieren(ip, quellen),
        }
    }

    fn verbrauchen(self, verbindung: &EconVerbindung, peer: &ServerAdresse, ip: &str) -> bool {
        match self {
            Aktion::Bannen { .. } => verbindung.ist_ban_propagation_ignoriert(peer, ip),
            Aktion::Entbannen => verbindung.ist_unban_propagation_ignoriert(peer, ip),
        }
    }

    fn ausfuehren(self, verbindung: &EconVerbindung, ausloeser: &ServerAdresse, ip: &str) -> Result<()> {
        match self {
            Aktion::Bannen { dauer, grund } => verbindung.ip_bannen(ausloeser, ip, dauer, grund),
            Aktion::Entbannen => verbindung.ip_entbannen(ausloeser, ip),
        }
    }
}

impl Broker {
    /// Bannt eine IP auf allen Servern.
    ///
    /// Jeder Server wird vorher fuer alle anderen markiert, sodass keiner
    /// der geloggten Bans eine weitere Welle ausloest. Bricht beim ersten
    /// Fehler ab.
    pub fn auf_allen_bannen(
        &self,
        ausloeser: &ServerAdresse,
        ip: &str,
        dauer: Duration,
        grund: &str,
    ) -> Result<()> {
        self.auf_allen(ausloeser, ip, Aktion::Bannen { dauer, grund })
    }

    pub fn auf_allen_entbannen(&self, ausloeser: &ServerAdresse, ip: &str) -> Result<()> {
        self.auf_allen(ausloeser, ip, Aktion::Entbannen)
    }

    /// Uebertraegt einen auf `ausloeser` geloggten Ban auf alle anderen Server.
    ///
    /// # Panics
    /// Wenn `ausloeser` nicht registriert ist.
    pub fn auf_anderen_bannen(
        &self,
        ausloeser: &ServerAdresse,
        ip: &str,
        dauer: Duration,
        grund: &str,
    ) -> Result<()> {
        self.auf_anderen(ausloeser, ip, Aktion::Bannen { dauer, grund })
    }

    /// Wie `auf_anderen_bannen`, mit den Unban-Markierungen.
    ///
    /// # Panics
    /// Wenn `ausloeser` nicht registriert ist.
    pub fn auf_anderen_entbannen(&self, ausloeser: &ServerAdresse, ip: &str) -> Result<()> {
        self.auf_anderen(ausloeser, ip, Aktion::Entbannen)
    }

    fn auf_allen(&self, ausloeser: &ServerAdresse, ip: &str, aktion: Aktion<'_>) -> Result<()> {
        let _sperre = self.propagation.lock();
        let register = self.register.read();

        for (adresse, verbindung) in register.verbindungen() {
            aktion.markieren(verbindung, ip, register.andere_von(adresse));
            if let Err(e) = aktion.ausfuehren(verbindung, ausloeser, ip) {
                tracing::warn!(
                    server = %adresse,
                    ausloeser = %ausloeser,
                    ip = %ip,
                    fehler = %e,
                    "{} auf allen Servern abgebrochen",
                    aktion.name()
                );
                return Err(e);
            }
        }
        Ok(())
    }

    fn auf_anderen(&self, ausloeser: &ServerAdresse, ip: &str, aktion: Aktion<'_>) -> Result<()> {
        let _sperre = self.propagation.lock();
        let register = self.register.read();

        let Some(quelle) = register.get(ausloeser) else {
            panic!("ausloesender Server {ausloeser} ist nicht registriert");
        };
        let andere = register.andere_von(ausloeser);

        // Zulassungs-Ban auf genau diesem Server
        if aktion.verbrauchen(quelle, ausloeser, ip) {
            tracing::debug!(server = %ausloeser, ip = %ip, "{} nicht propagiert (lokal)", aktion.name());
            return Ok(());
        }

        // Ergebnis einer Welle, die einen anderen Server als Ursprung hat
        let mut geschluckt = false;
        for adresse in andere {
            if aktion.verbrauchen(register.verbindung(adresse), ausloeser, ip) {
                geschluckt = true;
            }
        }
        if geschluckt {
            tracing::debug!(server = %ausloeser, ip = %ip, "{} bereits propagiert", aktion.name());
            return Ok(());
        }

        for adresse in andere {
            aktion.markieren(quelle, ip, std::slice::from_ref(adresse));
            if let Err(e) = aktion.ausfuehren(register.verbindung(adresse), ausloeser, ip) {
                aktion.verbrauchen(quelle, adresse, ip);
                return Err(e);
            }
        }
        Ok(())
    }
}

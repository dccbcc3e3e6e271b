//! Gemeinsame Test-Helfer: In-Memory-Flotte ueber `tokio::io::duplex`

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use econban_broker::{Broker, BrokerKonfig};
use econban_core::{EconbanError, Result, ServerAdresse, TeeworldsKlassifizierer};
use econban_econ::{EconTransport, Verbinder};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::DuplexStream;
use tokio_util::codec::{Framed, LinesCodec};

/// Verbinder, der statt TCP ein Duplex-Paar erzeugt und die Gegenstelle
/// fuer den Test aufhebt
#[derive(Default)]
pub struct SpeicherVerbinder {
    gegenstellen: Mutex<HashMap<ServerAdresse, DuplexStream>>,
    fehlschlagen: Mutex<HashSet<ServerAdresse>>,
}

impl SpeicherVerbinder {
    pub fn fehlschlagen_fuer(&self, adresse: &str) {
        self.fehlschlagen.lock().insert(ServerAdresse::from(adresse));
    }

    pub fn gegenstelle(&self, adresse: &str) -> Gegenstelle {
        let stream = self
            .gegenstellen
            .lock()
            .remove(&ServerAdresse::from(adresse))
            .expect("keine Gegenstelle fuer Adresse");
        Gegenstelle(Framed::new(stream, LinesCodec::new()))
    }
}

#[async_trait]
impl Verbinder for SpeicherVerbinder {
    async fn verbinden(&self, adresse: &ServerAdresse, _passwort: &str) -> Result<EconTransport> {
        if self.fehlschlagen.lock().contains(adresse) {
            return Err(EconbanError::Verbindung(format!("{adresse}: abgelehnt")));
        }
        let (nah, fern) = tokio::io::duplex(64 * 1024);
        self.gegenstellen.lock().insert(adresse.clone(), fern);
        Ok(EconTransport::aus_stream(nah))
    }
}

/// Simulierter Game-Server: schreibt Log-Zeilen, liest Befehle
pub struct Gegenstelle(Framed<DuplexStream, LinesCodec>);

impl Gegenstelle {
    pub async fn log(&mut self, zeile: &str) {
        self.0.send(zeile).await.expect("Log-Zeile senden");
    }

    pub async fn befehl(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(2), self.0.next())
            .await
            .expect("kein Befehl innerhalb des Zeitlimits")
            .expect("Stream beendet")
            .expect("Lesefehler")
    }

    /// Stellt sicher, dass in kurzer Zeit kein Befehl ankommt
    pub async fn kein_befehl(&mut self) {
        if let Ok(Some(Ok(befehl))) =
            tokio::time::timeout(Duration::from_millis(200), self.0.next()).await
        {
            panic!("unerwarteter Befehl: {befehl}");
        }
    }

    /// Wartet auf das Ende der Befehlsrichtung
    pub async fn ende(&mut self) -> bool {
        matches!(
            tokio::time::timeout(Duration::from_secs(2), self.0.next()).await,
            Ok(None)
        )
    }
}

pub struct Flotte {
    pub broker: Arc<Broker>,
    pub verbinder: Arc<SpeicherVerbinder>,
    pub server: BTreeMap<&'static str, Gegenstelle>,
}

impl Flotte {
    pub async fn starten(adressen: &[&'static str], konfig: BrokerKonfig) -> Self {
        let verbinder = Arc::new(SpeicherVerbinder::default());
        let broker = Broker::neu(
            konfig,
            Arc::clone(&verbinder) as Arc<dyn Verbinder>,
            Arc::new(TeeworldsKlassifizierer),
        );

        let mut server = BTreeMap::new();
        for adresse in adressen {
            broker
                .verbinden_mit(ServerAdresse::from(*adresse), "geheim")
                .await
                .expect("verbinden");
            server.insert(*adresse, verbinder.gegenstelle(adresse));
        }

        Self {
            broker,
            verbinder,
            server,
        }
    }

    pub fn s(&mut self, adresse: &str) -> &mut Gegenstelle {
        self.server.get_mut(adresse).expect("unbekannter Server")
    }

    /// Prueft, dass keiner der Server einen Befehl bekommt
    pub async fn ruhe(&mut self) {
        for gegenstelle in self.server.values_mut() {
            gegenstelle.kein_befehl().await;
        }
    }
}

pub fn ban_zeile(ip: &str, minuten: u64, grund: &str) -> String {
    format!("[2025-02-16 10:39:05][net_ban]: banned '{ip}' for {minuten} minutes ({grund})")
}

pub fn unban_zeile(ip: &str) -> String {
    format!("[2025-03-16 11:45:59][net_ban]: unbanned index 0 ('{ip}')")
}

pub fn betreten_zeile(client_id: u32, ip: &str) -> String {
    format!(
        "[2024-12-29 13:50:42][server]: player has entered the game. ClientID={client_id} addr={ip}:64285"
    )
}

pub fn chat_zeile(client_id: u32, nick: &str, nachricht: &str) -> String {
    format!("[17:55:36][chat]: {client_id}:-1:{nick}: {nachricht}")
}

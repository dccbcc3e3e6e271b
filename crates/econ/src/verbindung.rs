//! EconVerbindung – Verwaltet eine einzelne econ-Konsolen-Verbindung
//!
//! Jede Verbindung besteht aus drei tokio-Tasks, die sich ein
//! Shutdown-Signal (`watch`) teilen:
//!
//! ```text
//! Transport --> Lese-Task --(Zeilen, 64)--> Dispatch-Task --> ZeilenHandler
//!                                                  |
//!                                                  +--> Client-Register
//! ip_bannen / ip_entbannen --(Befehle)--> Schreib-Task --> Transport
//! ```
//!
//! Befehle werden nur eingereiht, das Senden blockiert nie.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Weak};
use std::time::Duration;

use econban_core::{ClientId, EconbanError, Ereignis, Klassifizierer, Result, ServerAdresse};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::transport::{
    ist_transienter_fehler, EconTransport, Verbinder, ZeilenLeser, ZeilenSchreiber,
};

/// Groesse der Zeilen-Queue zwischen Lese- und Dispatch-Task
const ZEILEN_QUEUE_GROESSE: usize = 64;

/// Empfaenger fuer jede gelesene Log-Zeile einer Verbindung
pub trait ZeilenHandler: Send + Sync + 'static {
    fn zeile_behandeln(&self, verbindung: &Arc<EconVerbindung>, zeile: &str);
}

impl<F> ZeilenHandler for F
where
    F: Fn(&Arc<EconVerbindung>, &str) + Send + Sync + 'static,
{
    fn zeile_behandeln(&self, verbindung: &Arc<EconVerbindung>, zeile: &str) {
        self(verbindung, zeile)
    }
}

/// `ban <ip> <minuten> <grund>`; Minuten aufgerundet, mindestens 1
pub fn ban_befehl(ip: &str, dauer: Duration, grund: &str) -> String {
    let sekunden = dauer.as_secs() + u64::from(dauer.subsec_nanos() > 0);
    let minuten = sekunden.div_ceil(60).max(1);
    let grund = grund.replace(['\r', '\n'], " ");
    let grund = grund.trim();

    if grund.is_empty() {
        format!("ban {ip} {minuten}")
    } else {
        format!("ban {ip} {minuten} {grund}")
    }
}

/// `unban <ip>`
pub fn unban_befehl(ip: &str) -> String {
    format!("unban {ip}")
}

// ---------------------------------------------------------------------------
// Propagations-Markierungen
// ---------------------------------------------------------------------------

/// Erwartete Echos "naechste Propagation von Peer X fuer IP Y ignorieren".
///
/// Gezaehlt, damit mehrere Wellen fuer dieselbe IP jeweils gesendet und
/// ihre Echos jeweils einzeln geschluckt werden.
#[derive(Default)]
struct Markierungen(Mutex<HashMap<ServerAdresse, HashMap<String, usize>>>);

impl Markierungen {
    fn setzen(&self, ip: &str, quellen: &[ServerAdresse]) {
        let mut map = self.0.lock();
        for quelle in quellen {
            *map.entry(quelle.clone())
                .or_default()
                .entry(ip.to_string())
                .or_default() += 1;
        }
    }

    fn verbrauchen(&self, peer: &ServerAdresse, ip: &str) -> bool {
        let mut map = self.0.lock();
        let Some(ips) = map.get_mut(peer) else {
            return false;
        };
        let Some(anzahl) = ips.get_mut(ip) else {
            return false;
        };
        *anzahl -= 1;
        if *anzahl == 0 {
            ips.remove(ip);
        }
        if ips.is_empty() {
            map.remove(peer);
        }
        true
    }

    fn anzahl(&self, peer: &ServerAdresse, ip: &str) -> usize {
        self.0
            .lock()
            .get(peer)
            .and_then(|ips| ips.get(ip))
            .copied()
            .unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// EconVerbindung
// ---------------------------------------------------------------------------

struct PipelineTasks {
    leser: JoinHandle<()>,
    schreiber: JoinHandle<io::Result<()>>,
    dispatcher: JoinHandle<()>,
}

/// Eine laufende econ-Verbindung zu einem Game-Server
pub struct EconVerbindung {
    adresse: ServerAdresse,
    befehl_tx: mpsc::UnboundedSender<String>,
    shutdown_tx: watch::Sender<bool>,
    /// Client-ID -> IP, gepflegt ausschliesslich vom Dispatch-Task
    clients: Mutex<HashMap<ClientId, String>>,
    ignorierte_bans: Markierungen,
    ignorierte_unbans: Markierungen,
    tasks: Mutex<Option<PipelineTasks>>,
}

impl std::fmt::Debug for EconVerbindung {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EconVerbindung")
            .field("adresse", &self.adresse)
            .field("geschlossen", &*self.shutdown_tx.borrow())
            .finish()
    }
}

impl EconVerbindung {
    /// Baut ueber den Verbinder einen Transport auf und startet die Pipeline
    pub async fn verbinden(
        verbinder: &dyn Verbinder,
        adresse: ServerAdresse,
        passwort: &str,
        handler: Arc<dyn ZeilenHandler>,
        klassifizierer: Arc<dyn Klassifizierer>,
    ) -> Result<Arc<Self>> {
        let transport = verbinder.verbinden(&adresse, passwort).await?;
        tracing::info!(server = %adresse, "econ-Verbindung hergestellt");
        Ok(Self::starten(adresse, transport, handler, klassifizierer))
    }

    /// Startet Lese-, Schreib- und Dispatch-Task auf einem bereits
    /// authentifizierten Transport. Muss innerhalb einer tokio-Runtime
    /// aufgerufen werden.
    pub fn starten(
        adresse: ServerAdresse,
        transport: EconTransport,
        handler: Arc<dyn ZeilenHandler>,
        klassifizierer: Arc<dyn Klassifizierer>,
    ) -> Arc<Self> {
        let (befehl_tx, befehl_rx) = mpsc::unbounded_channel();
        let (zeilen_tx, zeilen_rx) = mpsc::channel(ZEILEN_QUEUE_GROESSE);
        let (shutdown_tx, _) = watch::channel(false);

        let verbindung = Arc::new(Self {
            adresse: adresse.clone(),
            befehl_tx,
            shutdown_tx,
            clients: Mutex::new(HashMap::new()),
            ignorierte_bans: Markierungen::default(),
            ignorierte_unbans: Markierungen::default(),
            tasks: Mutex::new(None),
        });

        let EconTransport { leser, schreiber } = transport;

        let tasks = PipelineTasks {
            leser: tokio::spawn(lese_schleife(
                adresse.clone(),
                leser,
                zeilen_tx,
                verbindung.shutdown_tx.subscribe(),
            )),
            schreiber: tokio::spawn(schreib_schleife(
                adresse,
                schreiber,
                befehl_rx,
                verbindung.shutdown_tx.subscribe(),
            )),
            dispatcher: tokio::spawn(dispatch_schleife(
                Arc::downgrade(&verbindung),
                zeilen_rx,
                handler,
                klassifizierer,
                verbindung.shutdown_tx.subscribe(),
            )),
        };
        *verbindung.tasks.lock() = Some(tasks);

        verbindung
    }

    pub fn adresse(&self) -> &ServerAdresse {
        &self.adresse
    }

    /// Reiht einen Ban-Befehl ein. `ausloeser` ist nur fuer das Logging.
    pub fn ip_bannen(
        &self,
        ausloeser: &ServerAdresse,
        ip: &str,
        dauer: Duration,
        grund: &str,
    ) -> Result<()> {
        if ip.is_empty() {
            return Err(EconbanError::UngueltigesArgument(
                "leere IP kann nicht gebannt werden".into(),
            ));
        }
        tracing::debug!(
            server = %self.adresse,
            ausloeser = %ausloeser,
            ip = %ip,
            dauer = ?dauer,
            "Ban wird gesendet"
        );
        self.senden(ban_befehl(ip, dauer, grund))
    }

    /// Reiht einen Unban-Befehl ein
    pub fn ip_entbannen(&self, ausloeser: &ServerAdresse, ip: &str) -> Result<()> {
        if ip.is_empty() {
            return Err(EconbanError::UngueltigesArgument(
                "leere IP kann nicht entbannt werden".into(),
            ));
        }
        tracing::debug!(
            server = %self.adresse,
            ausloeser = %ausloeser,
            ip = %ip,
            "Unban wird gesendet"
        );
        self.senden(unban_befehl(ip))
    }

    fn senden(&self, befehl: String) -> Result<()> {
        if *self.shutdown_tx.borrow() {
            return Err(EconbanError::Geschlossen(self.adresse.to_string()));
        }
        self.befehl_tx
            .send(befehl)
            .map_err(|_| EconbanError::Geschlossen(self.adresse.to_string()))
    }

    /// IP, mit der ein Client das Spiel betreten hat
    pub fn client_ip(&self, client_id: ClientId) -> Option<String> {
        self.clients.lock().get(&client_id).cloned()
    }

    pub fn ban_propagation_ignorieren(&self, ip: &str, quellen: &[ServerAdresse]) {
        self.ignorierte_bans.setzen(ip, quellen);
    }

    /// Prueft und verbraucht eine Ban-Markierung
    pub fn ist_ban_propagation_ignoriert(&self, peer: &ServerAdresse, ip: &str) -> bool {
        self.ignorierte_bans.verbrauchen(peer, ip)
    }

    /// Wie `ist_ban_propagation_ignoriert`, verbraucht aber nichts
    pub fn hat_ban_propagation_ausstehend(&self, peer: &ServerAdresse, ip: &str) -> bool {
        self.ausstehende_ban_echos(peer, ip) > 0
    }

    /// Anzahl noch erwarteter Ban-Echos von `peer` fuer `ip`
    pub fn ausstehende_ban_echos(&self, peer: &ServerAdresse, ip: &str) -> usize {
        self.ignorierte_bans.anzahl(peer, ip)
    }

    pub fn unban_propagation_ignorieren(&self, ip: &str, quellen: &[ServerAdresse]) {
        self.ignorierte_unbans.setzen(ip, quellen);
    }

    pub fn ist_unban_propagation_ignoriert(&self, peer: &ServerAdresse, ip: &str) -> bool {
        self.ignorierte_unbans.verbrauchen(peer, ip)
    }

    pub fn hat_unban_propagation_ausstehend(&self, peer: &ServerAdresse, ip: &str) -> bool {
        self.ausstehende_unban_echos(peer, ip) > 0
    }

    pub fn ausstehende_unban_echos(&self, peer: &ServerAdresse, ip: &str) -> usize {
        self.ignorierte_unbans.anzahl(peer, ip)
    }

    /// Beendet alle drei Tasks und wartet auf sie.
    ///
    /// Gibt den Fehler beim Schliessen der Schreibrichtung zurueck.
    /// Ein zweiter Aufruf ist ein No-op. Darf nicht aus dem
    /// `ZeilenHandler` dieser Verbindung heraus aufgerufen werden.
    pub async fn schliessen(&self) -> Result<()> {
        self.shutdown_tx.send_replace(true);

        let Some(tasks) = self.tasks.lock().take() else {
            return Ok(());
        };

        let leser = tasks.leser.await;
        let dispatcher = tasks.dispatcher.await;
        let schreiber = tasks.schreiber.await;

        let mut fehler = Vec::new();
        for (name, ergebnis) in [("Lese-Task", leser), ("Dispatch-Task", dispatcher)] {
            if let Err(e) = ergebnis {
                fehler.push(EconbanError::Transport(format!("{name} abgebrochen: {e}")));
            }
        }
        match schreiber {
            Ok(Ok(())) => {}
            Ok(Err(e)) => fehler.push(EconbanError::Io(e)),
            Err(e) => fehler.push(EconbanError::Transport(format!(
                "Schreib-Task abgebrochen: {e}"
            ))),
        }

        tracing::info!(server = %self.adresse, "econ-Verbindung geschlossen");

        match EconbanError::sammeln(fehler) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn zeile_verarbeiten(
        self: &Arc<Self>,
        zeile: &str,
        handler: &dyn ZeilenHandler,
        klassifizierer: &dyn Klassifizierer,
    ) {
        match klassifizierer.klassifizieren(zeile) {
            Some(Ereignis::ClientBetreten { client_id, ip, .. }) => {
                self.clients.lock().insert(client_id, ip);
            }
            Some(Ereignis::ClientGetrennt { client_id, .. }) => {
                self.clients.lock().remove(&client_id);
            }
            _ => {}
        }
        handler.zeile_behandeln(self, zeile);
    }
}

// ---------------------------------------------------------------------------
// Pipeline-Tasks
// ---------------------------------------------------------------------------

async fn lese_schleife(
    adresse: ServerAdresse,
    mut leser: Box<dyn ZeilenLeser>,
    zeilen_tx: mpsc::Sender<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let ergebnis = tokio::select! {
            biased;
            _ = shutdown_rx.wait_for(|s| *s) => break,
            ergebnis = leser.zeile_lesen() => ergebnis,
        };

        match ergebnis {
            Ok(Some(zeile)) => {
                tracing::trace!(server = %adresse, zeile = %zeile, "Zeile gelesen");
                tokio::select! {
                    biased;
                    _ = shutdown_rx.wait_for(|s| *s) => break,
                    gesendet = zeilen_tx.send(zeile) => {
                        if gesendet.is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(None) => {
                tracing::info!(server = %adresse, "econ-Stream vom Server beendet");
                break;
            }
            Err(e) if ist_transienter_fehler(&e) => {
                tracing::warn!(server = %adresse, fehler = %e, "Lesefehler, Zeile verworfen");
            }
            Err(e) => {
                tracing::warn!(server = %adresse, fehler = %e, "Lesefehler, Lese-Task beendet");
                break;
            }
        }
    }
    // zeilen_tx wird hier gedroppt -> Dispatch-Task sieht Stream-Ende
}

async fn schreib_schleife(
    adresse: ServerAdresse,
    mut schreiber: Box<dyn ZeilenSchreiber>,
    mut befehl_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> io::Result<()> {
    loop {
        let befehl = tokio::select! {
            biased;
            _ = shutdown_rx.wait_for(|s| *s) => break,
            befehl = befehl_rx.recv() => match befehl {
                Some(befehl) => befehl,
                None => break,
            },
        };

        if let Err(e) = schreiber.zeile_schreiben(&befehl).await {
            if ist_transienter_fehler(&e) {
                tracing::warn!(server = %adresse, fehler = %e, befehl = %befehl, "Schreibfehler");
                continue;
            }
            tracing::warn!(server = %adresse, fehler = %e, "Schreibfehler, Schreib-Task beendet");
            break;
        }
    }

    befehl_rx.close();
    schreiber.schliessen().await
}

async fn dispatch_schleife(
    verbindung: Weak<EconVerbindung>,
    mut zeilen_rx: mpsc::Receiver<String>,
    handler: Arc<dyn ZeilenHandler>,
    klassifizierer: Arc<dyn Klassifizierer>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        let zeile = tokio::select! {
            biased;
            _ = shutdown_rx.wait_for(|s| *s) => break,
            zeile = zeilen_rx.recv() => match zeile {
                Some(zeile) => zeile,
                None => break,
            },
        };

        let Some(verbindung) = verbindung.upgrade() else {
            break;
        };
        verbindung.zeile_verarbeiten(&zeile, handler.as_ref(), klassifizierer.as_ref());
    }
}

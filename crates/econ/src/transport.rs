//! Zeilen-Transport fuer die econ-Konsole
//!
//! Ein `EconTransport` besteht aus einer Lese- und einer Schreibhaelfte,
//! damit Lese- und Schreib-Task sie unabhaengig besitzen koennen.
//! Framing: `LinesCodec` (`\n`, `\r\n` wird toleriert).
//!
//! ## Anmeldung (econ)
//! ```text
//! Server: Enter password:
//! Client: <passwort>
//! Server: Authentication successful. External console access granted.
//! ```

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use econban_core::{EconbanError, Result, ServerAdresse};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};

/// Maximale Zeilenlaenge in Bytes; laengere Zeilen werden verworfen
pub const MAX_ZEILENLAENGE: usize = 8192;

const PASSWORT_AUFFORDERUNG: &str = "Enter password";
const ANMELDUNG_ERFOLGREICH: &str = "Authentication successful";
const FALSCHES_PASSWORT: &str = "Wrong password";

// ---------------------------------------------------------------------------
// Transport-Haelften
// ---------------------------------------------------------------------------

/// Lesehaelfte eines Zeilen-Transports
#[async_trait]
pub trait ZeilenLeser: Send + 'static {
    /// Liest die naechste Zeile ohne Zeilenende.
    ///
    /// `Ok(None)` bedeutet: Stream beendet.
    async fn zeile_lesen(&mut self) -> io::Result<Option<String>>;
}

/// Schreibhaelfte eines Zeilen-Transports
#[async_trait]
pub trait ZeilenSchreiber: Send + 'static {
    /// Schreibt eine Zeile, das Zeilenende wird angehaengt
    async fn zeile_schreiben(&mut self, zeile: &str) -> io::Result<()>;

    /// Flusht und schliesst die Schreibrichtung
    async fn schliessen(&mut self) -> io::Result<()>;
}

/// Authentifizierter, zeilenbasierter Duplex-Transport
pub struct EconTransport {
    pub leser: Box<dyn ZeilenLeser>,
    pub schreiber: Box<dyn ZeilenSchreiber>,
}

impl EconTransport {
    pub fn neu(leser: Box<dyn ZeilenLeser>, schreiber: Box<dyn ZeilenSchreiber>) -> Self {
        Self { leser, schreiber }
    }

    /// Erstellt einen Transport ueber einem beliebigen Byte-Stream
    /// (TCP, `tokio::io::duplex` in Tests).
    pub fn aus_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (lesen, schreiben) = tokio::io::split(stream);
        Self {
            leser: Box::new(LinesLeser {
                framed: FramedRead::new(
                    lesen,
                    ZeilenCodec(LinesCodec::new_with_max_length(MAX_ZEILENLAENGE)),
                ),
                nach_fehler: false,
            }),
            schreiber: Box::new(LinesSchreiber(FramedWrite::new(
                schreiben,
                LinesCodec::new_with_max_length(MAX_ZEILENLAENGE),
            ))),
        }
    }
}

/// `LinesCodec`, dessen Zeilenfehler (zu lang, kein UTF-8) als Element statt
/// als Decoder-Fehler geliefert werden. `FramedRead` pausiert sonst nach
/// jedem Decoder-Fehler mit einem einmaligen `None`.
struct ZeilenCodec(LinesCodec);

impl Decoder for ZeilenCodec {
    type Item = io::Result<String>;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<Self::Item>> {
        Ok(self.0.decode(buf).map_or_else(|e| Some(Err(codec_fehler(e))), |z| z.map(Ok)))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<Self::Item>> {
        Ok(self
            .0
            .decode_eof(buf)
            .map_or_else(|e| Some(Err(codec_fehler(e))), |z| z.map(Ok)))
    }
}

struct LinesLeser<R> {
    framed: FramedRead<R, ZeilenCodec>,
    /// Letzter Aufruf endete mit einem I/O-Fehler
    nach_fehler: bool,
}

#[async_trait]
impl<R> ZeilenLeser for LinesLeser<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn zeile_lesen(&mut self) -> io::Result<Option<String>> {
        loop {
            match self.framed.next().await {
                Some(Ok(zeile)) => {
                    self.nach_fehler = false;
                    return zeile.map(Some);
                }
                Some(Err(e)) => {
                    self.nach_fehler = true;
                    return Err(e);
                }
                // Pause nach einem Fehler, kein Stream-Ende
                None if self.nach_fehler => self.nach_fehler = false,
                None => return Ok(None),
            }
        }
    }
}

struct LinesSchreiber<W>(FramedWrite<W, LinesCodec>);

#[async_trait]
impl<W> ZeilenSchreiber for LinesSchreiber<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn zeile_schreiben(&mut self, zeile: &str) -> io::Result<()> {
        self.0.send(zeile).await.map_err(codec_fehler)
    }

    async fn schliessen(&mut self) -> io::Result<()> {
        SinkExt::<&str>::close(&mut self.0).await.map_err(codec_fehler)
    }
}

fn codec_fehler(e: LinesCodecError) -> io::Error {
    match e {
        LinesCodecError::MaxLineLengthExceeded => io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Zeile laenger als {MAX_ZEILENLAENGE} Bytes"),
        ),
        LinesCodecError::Io(e) => e,
    }
}

/// Lesefehler, nach denen der Stream weiter benutzbar ist
pub fn ist_transienter_fehler(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::InvalidData
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

// ---------------------------------------------------------------------------
// Verbinder
// ---------------------------------------------------------------------------

/// Baut einen authentifizierten Transport zu einer Adresse auf
#[async_trait]
pub trait Verbinder: Send + Sync + 'static {
    async fn verbinden(&self, adresse: &ServerAdresse, passwort: &str) -> Result<EconTransport>;
}

/// TCP-Verbinder mit econ-Anmeldung
#[derive(Debug, Clone)]
pub struct TcpVerbinder {
    /// Zeitlimit fuer Verbindungsaufbau und Anmeldung zusammen
    pub timeout: Duration,
}

impl Default for TcpVerbinder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

impl TcpVerbinder {
    pub fn neu(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Verbinder for TcpVerbinder {
    async fn verbinden(&self, adresse: &ServerAdresse, passwort: &str) -> Result<EconTransport> {
        let aufbau = async {
            let stream = TcpStream::connect(adresse.as_str())
                .await
                .map_err(|e| EconbanError::Verbindung(format!("{adresse}: {e}")))?;
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(server = %adresse, fehler = %e, "TCP_NODELAY nicht gesetzt");
            }
            authentifizieren(EconTransport::aus_stream(stream), adresse, passwort).await
        };

        match tokio::time::timeout(self.timeout, aufbau).await {
            Ok(ergebnis) => ergebnis,
            Err(_) => Err(EconbanError::Verbindung(format!(
                "{adresse}: Zeitlimit von {:?} ueberschritten",
                self.timeout
            ))),
        }
    }
}

/// Fuehrt die econ-Passwort-Anmeldung auf einem frischen Transport durch
/// und gibt ihn danach zurueck. Bereits gepufferte Zeilen bleiben erhalten.
pub async fn authentifizieren(
    mut transport: EconTransport,
    adresse: &ServerAdresse,
    passwort: &str,
) -> Result<EconTransport> {
    let mut passwort_gesendet = false;

    loop {
        let zeile = match transport.leser.zeile_lesen().await {
            Ok(Some(zeile)) => zeile,
            Ok(None) => {
                return Err(EconbanError::Verbindung(format!(
                    "{adresse}: Verbindung waehrend der Anmeldung beendet"
                )))
            }
            Err(e) => return Err(EconbanError::Verbindung(format!("{adresse}: {e}"))),
        };

        if zeile.contains(FALSCHES_PASSWORT) {
            return Err(EconbanError::Verbindung(format!(
                "{adresse}: falsches Passwort"
            )));
        }

        if !passwort_gesendet && zeile.contains(PASSWORT_AUFFORDERUNG) {
            transport
                .schreiber
                .zeile_schreiben(passwort)
                .await
                .map_err(|e| EconbanError::Verbindung(format!("{adresse}: {e}")))?;
            passwort_gesendet = true;
            continue;
        }

        if passwort_gesendet && zeile.contains(ANMELDUNG_ERFOLGREICH) {
            tracing::debug!(server = %adresse, "econ-Anmeldung erfolgreich");
            return Ok(transport);
        }

        tracing::trace!(server = %adresse, zeile = %zeile, "Zeile waehrend der Anmeldung ignoriert");
    }
}

//! econban-econ – Verbindungen zu econ-Konsolen
//!
//! - `transport`: zeilenbasierter Transport (Lese-/Schreibhaelfte),
//!   TCP-Verbinder mit Passwort-Anmeldung
//! - `verbindung`: `EconVerbindung` mit Lese-, Schreib- und
//!   Dispatch-Task, Client-Register und Propagations-Markierungen

pub mod transport;
pub mod verbindung;

pub use transport::{EconTransport, TcpVerbinder, Verbinder, ZeilenLeser, ZeilenSchreiber};
pub use verbindung::{ban_befehl, unban_befehl, EconVerbindung, ZeilenHandler};

//! econban-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! econban-Crates gemeinsam genutzt werden: den zentralen Fehler-Enum,
//! die Newtype-IDs, die Log-Ereignisse und den Zeilen-Klassifizierer.

pub mod error;
pub mod event;
pub mod klassifizierer;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{EconbanError, Result};
pub use event::{Ereignis, Klassifizierer};
pub use klassifizierer::TeeworldsKlassifizierer;
pub use types::{ClientId, ServerAdresse};

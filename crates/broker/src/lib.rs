//! econban-broker – Ban-Broker fuer eine Flotte von Game-Servern
//!
//! Der Broker ist der einzige `ZeilenHandler` aller econ-Verbindungen.
//! Er verteilt Bans und Unbans ohne Propagations-Schleifen, bannt
//! Blacklist-IPs beim Betreten und Spieler mit verbotenen Chat-Nachrichten.

pub mod broker;
pub mod konfig;
mod propagation;
mod register;

pub use broker::Broker;
pub use konfig::{BanVorgaben, BrokerKonfig};

//! econban-filter – Zulassungs- und Chat-Filter
//!
//! - `cidr`: binaerer Praefix-Trie fuer IPv4- und IPv6-Netze
//! - `ip_blacklist`: thread-sichere IP-Blacklist ueber dem Trie
//! - `chat_filter`: geordnete Liste verbotener Chat-Muster

pub mod chat_filter;
pub mod cidr;
pub mod ip_blacklist;

pub use chat_filter::ChatFilter;
pub use cidr::CidrTrie;
pub use ip_blacklist::IpBlacklist;

//! Zeilen-Klassifizierer fuer Teeworlds- und DDNet-Konsolen-Logs
//!
//! Erkennt die fuenf Ereignisarten in beiden Log-Dialekten:
//!
//! ```text
//! Vanilla: [2024-12-29 13:50:42][server]: player has entered the game. ClientID=2 addr=1.2.3.4:64285
//! DDNet:   2024-12-10 22:28:11 I server: player has entered the game. ClientId=2 addr=<{1.2.3.4:27996}> sixup=0
//! ```
//!
//! Ban- und Unban-Zeilen muessen die GANZE Zeile matchen, sonst koennte
//! ein Spieler per Chat eine passende Zeile schreiben und damit beliebige
//! IPs flottenweit bannen. Aus demselben Grund wird Chat zuerst geprueft.
//!
//! IPs bleiben unveraendert, IPv6-Adressen also mit eckigen Klammern.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::event::{Ereignis, Klassifizierer};
use crate::types::ClientId;

// id, ziel, nick, nachricht
static DDNET_CHAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"chat: (\d+):(-?\d+):(.+): (.+)$").expect("gueltiges Muster"));
static VANILLA_CHAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[chat\]: (\d+):(-?\d+):(.+): (.+)$").expect("gueltiges Muster"));

// id, ip, port
static BETRETEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)player has entered the game\. ClientID=(\d+) addr=[<{]{0,2}([\[\]:.0-9a-fA-F]+):(\d+)[}>]{0,2}",
    )
    .expect("gueltiges Muster")
});

// id, ip, port, grund
static GETRENNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"client dropped\. cid=(\d+) addr=[<{]{0,2}([\[\]:.0-9a-fA-F]+):(\d+)[}>]{0,2} reason='(.*)'",
    )
    .expect("gueltiges Muster")
});

// ip, minuten, grund
static DDNET_BAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?i)\[[\d\- :.]+\]\[net_ban\]: banned '([\[\]:.0-9a-fA-F]+)' for (\d+) minutes? \((.*)\)$",
    )
    .expect("gueltiges Muster")
});
static VANILLA_BAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?i)\[[\d\- :.]+\]\[net_ban\]: '([\[\]:.0-9a-fA-F]+)' banned for (\d+) minutes? \((.*)\)$",
    )
    .expect("gueltiges Muster")
});

// ip
static UNBAN_INDEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)\[[\d\- :.]+\]\[net_ban\]: unbanned index \d+ \('([\[\]:.0-9a-fA-F]+)'\)$")
        .expect("gueltiges Muster")
});
static UNBAN_IP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?i)\[[\d\- :.]+\]\[net_ban\]: unbanned '([\[\]:.0-9a-fA-F]+)' for \d+ minutes? \(.*\)$",
    )
    .expect("gueltiges Muster")
});

/// Klassifizierer fuer Vanilla-Teeworlds- und DDNet-Logzeilen
#[derive(Debug, Default, Clone, Copy)]
pub struct TeeworldsKlassifizierer;

impl TeeworldsKlassifizierer {
    pub fn neu() -> Self {
        Self
    }
}

impl Klassifizierer for TeeworldsKlassifizierer {
    fn klassifizieren(&self, zeile: &str) -> Option<Ereignis> {
        chat_parsen(zeile)
            .or_else(|| betreten_parsen(zeile))
            .or_else(|| getrennt_parsen(zeile))
            .or_else(|| gebannt_parsen(zeile))
            .or_else(|| entbannt_parsen(zeile))
    }
}

fn erster_treffer<'a>(muster: &[&Regex], zeile: &'a str) -> Option<Captures<'a>> {
    muster.iter().find_map(|re| re.captures(zeile))
}

fn gruppe<'a>(caps: &Captures<'a>, i: usize) -> &'a str {
    caps.get(i).map_or("", |m| m.as_str())
}

fn chat_parsen(zeile: &str) -> Option<Ereignis> {
    let caps = erster_treffer(&[&*DDNET_CHAT, &*VANILLA_CHAT], zeile)?;
    Some(Ereignis::ChatNachricht {
        client_id: ClientId(gruppe(&caps, 1).parse().ok()?),
        ziel_id: gruppe(&caps, 2).parse().ok()?,
        nickname: gruppe(&caps, 3).to_string(),
        nachricht: gruppe(&caps, 4).to_string(),
    })
}

fn betreten_parsen(zeile: &str) -> Option<Ereignis> {
    let caps = BETRETEN.captures(zeile)?;
    Some(Ereignis::ClientBetreten {
        client_id: ClientId(gruppe(&caps, 1).parse().ok()?),
        ip: gruppe(&caps, 2).to_string(),
        port: gruppe(&caps, 3).parse().ok()?,
    })
}

fn getrennt_parsen(zeile: &str) -> Option<Ereignis> {
    let caps = GETRENNT.captures(zeile)?;
    Some(Ereignis::ClientGetrennt {
        client_id: ClientId(gruppe(&caps, 1).parse().ok()?),
        ip: gruppe(&caps, 2).to_string(),
        port: gruppe(&caps, 3).parse().ok()?,
        grund: gruppe(&caps, 4).to_string(),
    })
}

fn gebannt_parsen(zeile: &str) -> Option<Ereignis> {
    let caps = erster_treffer(&[&*DDNET_BAN, &*VANILLA_BAN], zeile)?;
    let minuten: u64 = gruppe(&caps, 2).parse().ok()?;
    Some(Ereignis::ClientGebannt {
        ip: gruppe(&caps, 1).to_string(),
        dauer: Duration::from_secs(minuten.checked_mul(60)?),
        grund: gruppe(&caps, 3).to_string(),
    })
}

fn entbannt_parsen(zeile: &str) -> Option<Ereignis> {
    let caps = erster_treffer(&[&*UNBAN_INDEX, &*UNBAN_IP], zeile)?;
    Some(Ereignis::ClientEntbannt {
        ip: gruppe(&caps, 1).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(zeile: &str) -> Option<Ereignis> {
        TeeworldsKlassifizierer.klassifizieren(zeile)
    }

    #[test]
    fn ddnet_chat() {
        assert_eq!(
            k("2024-11-25 01:12:00 I chat: 6:-2:scuf: b"),
            Some(Ereignis::ChatNachricht {
                client_id: ClientId(6),
                ziel_id: -2,
                nickname: "scuf".into(),
                nachricht: "b".into(),
            })
        );
    }

    #[test]
    fn vanilla_chat() {
        assert_eq!(
            k("[17:55:36][chat]: 0:-1:p'*mac: test"),
            Some(Ereignis::ChatNachricht {
                client_id: ClientId(0),
                ziel_id: -1,
                nickname: "p'*mac".into(),
                nachricht: "test".into(),
            })
        );
    }

    #[test]
    fn betreten_beide_dialekte() {
        let faelle = [
            (
                "2024-12-10 22:28:11 I server: player has entered the game. ClientId=2 addr=<{123.123.123.123:27996}> sixup=0",
                "123.123.123.123",
                27996,
            ),
            (
                "2024-12-10 22:28:11 I server: player has entered the game. ClientId=2 addr=<{[eadc:6745:7332:1a06:a9b2:ef9e:60e8:1c3f]:27996}> sixup=0",
                "[eadc:6745:7332:1a06:a9b2:ef9e:60e8:1c3f]",
                27996,
            ),
            (
                "[2024-12-29 13:50:42][server]: player has entered the game. ClientID=2 addr=234.234.234.234:64285",
                "234.234.234.234",
                64285,
            ),
            (
                "[2024-12-29 13:50:42][server]: player has entered the game. ClientID=2 addr=[0c2c:7f29:0206:717f:9c6d:8e17:8934:4e6c]:64285",
                "[0c2c:7f29:0206:717f:9c6d:8e17:8934:4e6c]",
                64285,
            ),
        ];

        for (zeile, ip, port) in faelle {
            assert_eq!(
                k(zeile),
                Some(Ereignis::ClientBetreten {
                    client_id: ClientId(2),
                    ip: ip.into(),
                    port,
                }),
                "Zeile: {zeile}"
            );
        }
    }

    #[test]
    fn getrennt_vanilla() {
        assert_eq!(
            k("[2024-12-29 13:50:46][server]: client dropped. cid=5 addr=123.123.123.123:64285 reason=''"),
            Some(Ereignis::ClientGetrennt {
                client_id: ClientId(5),
                ip: "123.123.123.123".into(),
                port: 64285,
                grund: "".into(),
            })
        );
    }

    #[test]
    fn getrennt_ddnet() {
        assert_eq!(
            k("2024-12-10 22:30:00 I server: client dropped. cid=1 addr=<{1.2.3.4:8303}> reason='Timeout'"),
            Some(Ereignis::ClientGetrennt {
                client_id: ClientId(1),
                ip: "1.2.3.4".into(),
                port: 8303,
                grund: "Timeout".into(),
            })
        );
    }

    #[test]
    fn gebannt_ddnet_und_vanilla() {
        assert_eq!(
            k("[2025-02-16 10:39:05][net_ban]: banned '123.123.123.123' for 1 minute (Stressing network)"),
            Some(Ereignis::ClientGebannt {
                ip: "123.123.123.123".into(),
                dauer: Duration::from_secs(60),
                grund: "Stressing network".into(),
            })
        );
        assert_eq!(
            k("[16:40:45][net_ban]: '123.123.123.124' banned for 120 minutes (test)"),
            Some(Ereignis::ClientGebannt {
                ip: "123.123.123.124".into(),
                dauer: Duration::from_secs(120 * 60),
                grund: "test".into(),
            })
        );
        assert_eq!(
            k("[2025-02-16 10:39:05][net_ban]: banned '[36bc:94f6:4608:14b4:f72a:8aa9:c75f:4e06]' for 1440 minute ()"),
            Some(Ereignis::ClientGebannt {
                ip: "[36bc:94f6:4608:14b4:f72a:8aa9:c75f:4e06]".into(),
                dauer: Duration::from_secs(1440 * 60),
                grund: "".into(),
            })
        );
    }

    #[test]
    fn entbannt_index_und_ip() {
        assert_eq!(
            k("[2025-03-16 11:45:59][net_ban]: unbanned index 0 ('[36bc:94f6:4608:14b4:f72a:8aa9:c75f:4e06]')"),
            Some(Ereignis::ClientEntbannt {
                ip: "[36bc:94f6:4608:14b4:f72a:8aa9:c75f:4e06]".into()
            })
        );
        assert_eq!(
            k("[2025-03-16 11:46:19][net_ban]: unbanned '1.2.3.4' for 1440 minutes (No reason given)"),
            Some(Ereignis::ClientEntbannt { ip: "1.2.3.4".into() })
        );
    }

    #[test]
    fn chat_mit_ban_zeile_bleibt_chat() {
        let zeile = "[17:55:36][chat]: 3:-1:troll: [2025-02-16 10:39:05][net_ban]: banned '0.0.0.0' for 1 minute (x)";
        assert!(matches!(k(zeile), Some(Ereignis::ChatNachricht { .. })));
    }

    #[test]
    fn unbekannte_zeilen() {
        assert_eq!(k("some random text"), None);
        assert_eq!(k(""), None);
        // ID ausserhalb des Wertebereichs -> kein Ereignis statt Panic
        assert_eq!(
            k("player has entered the game. ClientID=99999999999 addr=1.2.3.4:1"),
            None
        );
    }
}

//! Binaerer Praefix-Trie fuer CIDR-Netze
//!
//! Ein Wurzelknoten pro Adressfamilie. Jedes gespeicherte Netz markiert den
//! Knoten nach `praefix_len` Bits. Eine Adresse ist enthalten, wenn auf
//! ihrem Pfad ein markierter Knoten liegt.

use std::net::IpAddr;

use ipnet::IpNet;

#[derive(Debug, Default)]
struct Knoten {
    kinder: [Option<Box<Knoten>>; 2],
    netz_ende: bool,
}

impl Knoten {
    fn ist_leer(&self) -> bool {
        !self.netz_ende && self.kinder.iter().all(Option::is_none)
    }
}

/// Bits einer Adresse, linksbuendig gelesen
#[derive(Clone, Copy)]
struct Bits {
    wert: u128,
    breite: u8,
}

impl Bits {
    fn von(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self {
                wert: u128::from(u32::from(v4)),
                breite: 32,
            },
            IpAddr::V6(v6) => Self {
                wert: u128::from(v6),
                breite: 128,
            },
        }
    }

    fn bit(self, i: u8) -> usize {
        ((self.wert >> (self.breite - 1 - i)) & 1) as usize
    }
}

/// Menge von IPv4- und IPv6-Netzen mit Enthaltenseins-Abfrage
#[derive(Debug, Default)]
pub struct CidrTrie {
    v4: Knoten,
    v6: Knoten,
    anzahl: usize,
}

impl CidrTrie {
    pub fn neu() -> Self {
        Self::default()
    }

    fn wurzel(&self, ip: &IpAddr) -> &Knoten {
        match ip {
            IpAddr::V4(_) => &self.v4,
            IpAddr::V6(_) => &self.v6,
        }
    }

    fn wurzel_mut(&mut self, ip: &IpAddr) -> &mut Knoten {
        match ip {
            IpAddr::V4(_) => &mut self.v4,
            IpAddr::V6(_) => &mut self.v6,
        }
    }

    /// Fuegt ein Netz ein; Host-Bits werden abgeschnitten.
    /// Gibt `false` zurueck, wenn das Netz schon enthalten war.
    pub fn einfuegen(&mut self, netz: IpNet) -> bool {
        let netz = netz.trunc();
        let bits = Bits::von(netz.addr());

        let mut knoten = self.wurzel_mut(&netz.addr());
        for i in 0..netz.prefix_len() {
            knoten = &mut **knoten.kinder[bits.bit(i)].get_or_insert_with(Box::default);
        }

        if knoten.netz_ende {
            return false;
        }
        knoten.netz_ende = true;
        self.anzahl += 1;
        true
    }

    /// Entfernt genau dieses Netz (gleicher Praefix, gleiche Laenge).
    /// Gibt zurueck, ob es vorhanden war.
    pub fn entfernen(&mut self, netz: IpNet) -> bool {
        let netz = netz.trunc();
        let bits = Bits::von(netz.addr());
        let entfernt = entfernen_rekursiv(
            self.wurzel_mut(&netz.addr()),
            bits,
            0,
            netz.prefix_len(),
        );
        if entfernt {
            self.anzahl -= 1;
        }
        entfernt
    }

    /// Liegt die Adresse in einem gespeicherten Netz?
    ///
    /// IPv4-gemappte IPv6-Adressen werden als IPv4 geprueft.
    pub fn enthaelt(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        let bits = Bits::von(ip);

        let mut knoten = self.wurzel(&ip);
        if knoten.netz_ende {
            return true;
        }
        for i in 0..bits.breite {
            match &knoten.kinder[bits.bit(i)] {
                Some(kind) => knoten = &**kind,
                None => return false,
            }
            if knoten.netz_ende {
                return true;
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.anzahl
    }

    pub fn is_empty(&self) -> bool {
        self.anzahl == 0
    }
}

fn entfernen_rekursiv(knoten: &mut Knoten, bits: Bits, tiefe: u8, praefix_len: u8) -> bool {
    if tiefe == praefix_len {
        let war_da = knoten.netz_ende;
        knoten.netz_ende = false;
        return war_da;
    }

    let index = bits.bit(tiefe);
    let Some(kind) = knoten.kinder[index].as_mut() else {
        return false;
    };
    let entfernt = entfernen_rekursiv(kind, bits, tiefe + 1, praefix_len);
    if kind.ist_leer() {
        knoten.kinder[index] = None;
    }
    entfernt
}

//! Integration-Tests fuer die Ban-Propagation (In-Memory-Flotte)

mod common;

use std::time::Duration;

use common::{ban_zeile, unban_zeile, Flotte};
use econban_broker::{Broker, BrokerKonfig};
use econban_core::{EconbanError, ServerAdresse, TeeworldsKlassifizierer};
use econban_econ::TcpVerbinder;
use std::sync::Arc;

fn a(adresse: &str) -> ServerAdresse {
    ServerAdresse::from(adresse)
}

#[tokio::test]
async fn ban_wird_genau_einmal_an_andere_verteilt() {
    let mut flotte = Flotte::starten(&["a", "b", "c"], BrokerKonfig::default()).await;

    flotte.s("a").log(&ban_zeile("1.2.3.4", 10, "cheating")).await;
    assert_eq!(flotte.s("b").befehl().await, "ban 1.2.3.4 10 cheating");
    assert_eq!(flotte.s("c").befehl().await, "ban 1.2.3.4 10 cheating");

    // B und C loggen den uebertragenen Ban: wird geschluckt
    flotte.s("b").log(&ban_zeile("1.2.3.4", 10, "cheating")).await;
    flotte.s("c").log(&ban_zeile("1.2.3.4", 10, "cheating")).await;
    flotte.ruhe().await;
    flotte.s("a").kein_befehl().await;

    // Alle Markierungen sind verbraucht
    let broker = &flotte.broker;
    for (server, peer) in [("a", "b"), ("a", "c"), ("b", "a"), ("c", "a")] {
        let verbindung = broker.verbindung(&a(server)).unwrap();
        assert!(
            !verbindung.hat_ban_propagation_ausstehend(&a(peer), "1.2.3.4"),
            "offene Markierung {server} <- {peer}"
        );
    }

    broker.schliessen().await.unwrap();
}

#[tokio::test]
async fn zweiter_ban_vor_dem_echo_wird_erneut_verteilt() {
    let mut flotte = Flotte::starten(&["a", "b", "c"], BrokerKonfig::default()).await;

    for _ in 0..2 {
        flotte
            .broker
            .auf_anderen_bannen(&a("a"), "1.2.3.4", Duration::from_secs(60), "x")
            .unwrap();
    }
    for server in ["b", "c"] {
        assert_eq!(flotte.s(server).befehl().await, "ban 1.2.3.4 1 x");
        assert_eq!(flotte.s(server).befehl().await, "ban 1.2.3.4 1 x");
    }

    let a_verbindung = flotte.broker.verbindung(&a("a")).unwrap();
    assert_eq!(a_verbindung.ausstehende_ban_echos(&a("b"), "1.2.3.4"), 2);

    // beide Echos werden einzeln geschluckt
    for server in ["b", "c", "b", "c"] {
        flotte.s(server).log(&ban_zeile("1.2.3.4", 1, "x")).await;
    }
    flotte.ruhe().await;
    for server in ["a", "b", "c"] {
        flotte.s(server).kein_befehl().await;
    }
    assert_eq!(a_verbindung.ausstehende_ban_echos(&a("b"), "1.2.3.4"), 0);
    assert_eq!(a_verbindung.ausstehende_ban_echos(&a("c"), "1.2.3.4"), 0);

    flotte.broker.schliessen().await.unwrap();
}

#[tokio::test]
async fn zweiter_unban_vor_dem_echo_wird_erneut_verteilt() {
    let mut flotte = Flotte::starten(&["a", "b"], BrokerKonfig::default()).await;

    flotte.s("b").log(&unban_zeile("1.2.3.4")).await;
    flotte.s("b").log(&unban_zeile("1.2.3.4")).await;
    assert_eq!(flotte.s("a").befehl().await, "unban 1.2.3.4");
    assert_eq!(flotte.s("a").befehl().await, "unban 1.2.3.4");

    flotte.s("a").log(&unban_zeile("1.2.3.4")).await;
    flotte.s("a").log(&unban_zeile("1.2.3.4")).await;
    flotte.ruhe().await;
    flotte.s("a").kein_befehl().await;
    flotte.s("b").kein_befehl().await;

    let b = flotte.broker.verbindung(&a("b")).unwrap();
    assert_eq!(b.ausstehende_unban_echos(&a("a"), "1.2.3.4"), 0);

    flotte.broker.schliessen().await.unwrap();
}

#[tokio::test]
async fn ban_unban_ban_endet_ueberall_gebannt() {
    let mut flotte = Flotte::starten(&["a", "b"], BrokerKonfig::default()).await;

    flotte.s("a").log(&ban_zeile("1.2.3.4", 10, "x")).await;
    flotte.s("a").log(&unban_zeile("1.2.3.4")).await;
    flotte.s("a").log(&ban_zeile("1.2.3.4", 10, "x")).await;

    assert_eq!(flotte.s("b").befehl().await, "ban 1.2.3.4 10 x");
    assert_eq!(flotte.s("b").befehl().await, "unban 1.2.3.4");
    assert_eq!(flotte.s("b").befehl().await, "ban 1.2.3.4 10 x");

    // B loggt die drei Befehle in derselben Reihenfolge
    flotte.s("b").log(&ban_zeile("1.2.3.4", 10, "x")).await;
    flotte.s("b").log(&unban_zeile("1.2.3.4")).await;
    flotte.s("b").log(&ban_zeile("1.2.3.4", 10, "x")).await;
    flotte.ruhe().await;
    flotte.s("a").kein_befehl().await;

    let a_verbindung = flotte.broker.verbindung(&a("a")).unwrap();
    assert_eq!(a_verbindung.ausstehende_ban_echos(&a("b"), "1.2.3.4"), 0);
    assert_eq!(a_verbindung.ausstehende_unban_echos(&a("b"), "1.2.3.4"), 0);

    flotte.broker.schliessen().await.unwrap();
}

#[tokio::test]
async fn neuer_ban_nach_bestaetigung_wird_wieder_verteilt() {
    let mut flotte = Flotte::starten(&["a", "b"], BrokerKonfig::default()).await;

    flotte.s("a").log(&ban_zeile("1.2.3.4", 5, "x")).await;
    assert_eq!(flotte.s("b").befehl().await, "ban 1.2.3.4 5 x");
    flotte.s("b").log(&ban_zeile("1.2.3.4", 5, "x")).await;
    flotte.ruhe().await;

    // B bannt die IP spaeter selbst erneut
    flotte.s("b").log(&ban_zeile("1.2.3.4", 60, "wieder")).await;
    assert_eq!(flotte.s("a").befehl().await, "ban 1.2.3.4 60 wieder");
    flotte.s("b").kein_befehl().await;

    flotte.broker.schliessen().await.unwrap();
}

#[tokio::test]
async fn unban_wird_verteilt_und_geschluckt() {
    let mut flotte = Flotte::starten(&["a", "b", "c"], BrokerKonfig::default()).await;

    flotte.s("b").log(&unban_zeile("[2001:db8::1]")).await;
    assert_eq!(flotte.s("a").befehl().await, "unban [2001:db8::1]");
    assert_eq!(flotte.s("c").befehl().await, "unban [2001:db8::1]");

    flotte.s("a").log(&unban_zeile("[2001:db8::1]")).await;
    flotte.s("c").log(&unban_zeile("[2001:db8::1]")).await;
    flotte.ruhe().await;

    // Bans sind von Unbans unabhaengig
    let b = flotte.broker.verbindung(&a("b")).unwrap();
    assert!(!b.hat_ban_propagation_ausstehend(&a("a"), "[2001:db8::1]"));
    assert!(!b.hat_unban_propagation_ausstehend(&a("a"), "[2001:db8::1]"));

    flotte.broker.schliessen().await.unwrap();
}

#[tokio::test]
async fn ohne_propagation_passiert_nichts() {
    let konfig = BrokerKonfig {
        propagieren: false,
        ..BrokerKonfig::default()
    };
    let mut flotte = Flotte::starten(&["a", "b"], konfig).await;

    flotte.s("a").log(&ban_zeile("1.2.3.4", 10, "x")).await;
    flotte.s("a").log(&unban_zeile("1.2.3.4")).await;
    flotte.ruhe().await;

    flotte.broker.schliessen().await.unwrap();
}

#[tokio::test]
async fn auf_allen_bannen_ueber_zwei_server() {
    let mut flotte = Flotte::starten(&["a", "b"], BrokerKonfig::default()).await;

    flotte
        .broker
        .auf_allen_bannen(&a("extern"), "5.6.7.8", Duration::from_secs(120), "spam")
        .unwrap();
    assert_eq!(flotte.s("a").befehl().await, "ban 5.6.7.8 2 spam");
    assert_eq!(flotte.s("b").befehl().await, "ban 5.6.7.8 2 spam");

    flotte.s("a").log(&ban_zeile("5.6.7.8", 2, "spam")).await;
    flotte.s("b").log(&ban_zeile("5.6.7.8", 2, "spam")).await;
    flotte.ruhe().await;

    flotte
        .broker
        .auf_allen_entbannen(&a("extern"), "5.6.7.8")
        .unwrap();
    assert_eq!(flotte.s("a").befehl().await, "unban 5.6.7.8");
    assert_eq!(flotte.s("b").befehl().await, "unban 5.6.7.8");

    flotte.s("b").log(&unban_zeile("5.6.7.8")).await;
    flotte.s("a").log(&unban_zeile("5.6.7.8")).await;
    flotte.ruhe().await;

    flotte.broker.schliessen().await.unwrap();
}

#[tokio::test]
async fn fehler_bricht_verteilung_ab() {
    let mut flotte = Flotte::starten(&["a", "b", "c"], BrokerKonfig::default()).await;

    // B ist geschlossen, C kommt in der Reihenfolge danach
    let b = flotte.broker.verbindung(&a("b")).unwrap();
    b.schliessen().await.unwrap();

    let e = flotte
        .broker
        .auf_anderen_bannen(&a("a"), "1.2.3.4", Duration::from_secs(60), "x")
        .unwrap_err();
    assert!(matches!(e, EconbanError::Geschlossen(_)));

    flotte.s("c").kein_befehl().await;
    let a_verbindung = flotte.broker.verbindung(&a("a")).unwrap();
    assert!(!a_verbindung.hat_ban_propagation_ausstehend(&a("b"), "1.2.3.4"));
    assert!(!a_verbindung.hat_ban_propagation_ausstehend(&a("c"), "1.2.3.4"));

    flotte.broker.schliessen().await.unwrap();
}

#[test]
#[should_panic(expected = "nicht registriert")]
fn unbekannter_ausloeser_ist_programmfehler() {
    let broker = Broker::neu(
        BrokerKonfig::default(),
        Arc::new(TcpVerbinder::default()),
        Arc::new(TeeworldsKlassifizierer),
    );
    let _ = broker.auf_anderen_bannen(&a("fremd"), "1.2.3.4", Duration::from_secs(60), "x");
}

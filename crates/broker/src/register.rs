//! Server-Register: Adresse -> Verbindung und Adresse -> alle anderen
//!
//! Die "andere"-Tabelle wird nie einzeln veraendert, sondern bei jeder
//! Aenderung der Verbindungen komplett neu berechnet.

use std::collections::BTreeMap;
use std::sync::Arc;

use econban_core::ServerAdresse;
use econban_econ::EconVerbindung;

#[derive(Debug, Default)]
pub(crate) struct ServerRegister {
    verbindungen: BTreeMap<ServerAdresse, Arc<EconVerbindung>>,
    andere: BTreeMap<ServerAdresse, Vec<ServerAdresse>>,
}

impl ServerRegister {
    pub(crate) fn enthaelt(&self, adresse: &ServerAdresse) -> bool {
        self.verbindungen.contains_key(adresse)
    }

    pub(crate) fn get(&self, adresse: &ServerAdresse) -> Option<&Arc<EconVerbindung>> {
        self.verbindungen.get(adresse)
    }

    /// Verbindung eines registrierten Servers; unbekannte Adressen sind
    /// ein Programmfehler.
    pub(crate) fn verbindung(&self, adresse: &ServerAdresse) -> &Arc<EconVerbindung> {
        match self.verbindungen.get(adresse) {
            Some(verbindung) => verbindung,
            None => panic!("Server {adresse} fehlt im Register"),
        }
    }

    pub(crate) fn andere_von(&self, adresse: &ServerAdresse) -> &[ServerAdresse] {
        self.andere.get(adresse).map(Vec::as_slice).unwrap_or_default()
    }

    pub(crate) fn verbindungen(&self) -> impl Iterator<Item = (&ServerAdresse, &Arc<EconVerbindung>)> {
        self.verbindungen.iter()
    }

    pub(crate) fn adressen(&self) -> Vec<ServerAdresse> {
        self.verbindungen.keys().cloned().collect()
    }

    pub(crate) fn einfuegen(&mut self, verbindung: Arc<EconVerbindung>) {
        self.verbindungen
            .insert(verbindung.adresse().clone(), verbindung);
        self.andere_neu_berechnen();
    }

    /// Leert das Register und gibt alle Verbindungen zurueck
    pub(crate) fn alle_entnehmen(&mut self) -> Vec<Arc<EconVerbindung>> {
        let verbindungen = std::mem::take(&mut self.verbindungen);
        self.andere_neu_berechnen();
        verbindungen.into_values().collect()
    }

    fn andere_neu_berechnen(&mut self) {
        self.andere = andere_berechnen(self.verbindungen.keys());
    }
}

fn andere_berechnen<'a>(
    adressen: impl Iterator<Item = &'a ServerAdresse> + Clone,
) -> BTreeMap<ServerAdresse, Vec<ServerAdresse>> {
    adressen
        .clone()
        .map(|adresse| {
            let andere = adressen
                .clone()
                .filter(|andere| *andere != adresse)
                .cloned()
                .collect();
            (adresse.clone(), andere)
        })
        .collect()
}

//! Ereignis-Modell fuer Einbettungen
//!
//! Alle internen Signale (Verbindung, Session, Hoeren, TTS, Audio,
//! Nachrichten, Wiedergabe-Zustand, Fehler) werden von der Fassade in
//! einen einzigen typisierten Ereignis-Strom uebersetzt und an genau
//! einen registrierten Konsumenten geliefert. Der Callback laeuft auf
//! einem internen Thread und darf nicht blockieren.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AudioFrame, WiedergabeZustand};

/// Rolle einer Text-Nachricht im Dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRolle {
    /// Vom Benutzer gesprochen (STT-Ergebnis)
    Benutzer,
    /// Vom Dialog-Modell gesprochen (TTS-Satz)
    Assistent,
}

/// Quelle eines Fehler-Ereignisses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FehlerQuelle {
    Transport,
    Protokoll,
    Codec,
    Audio,
    Intern,
}

/// Alle Ereignisse die ueber den Ereignis-Strom fliessen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EreignisArt {
    // --- Verbindung ---
    /// WebSocket-Verbindung steht
    VerbindungHergestellt,
    /// WebSocket-Verbindung wurde getrennt
    VerbindungGetrennt,

    // --- Session ---
    /// Server-Hello empfangen, Session zugewiesen
    SessionAufgebaut { session_id: String },
    /// Server hat die Session mit `goodbye` beendet
    SessionBeendet,

    // --- Hoeren / TTS ---
    /// Hoeren gestartet (Mikrofon-Strom laeuft)
    HoerenGestartet,
    /// Hoeren gestoppt
    HoerenGestoppt,
    /// Server beginnt zu sprechen
    TtsGestartet,
    /// Server hat zu Ende gesprochen und der Wiedergabe-Puffer ist leer
    TtsGestoppt,

    // --- Nutzdaten ---
    /// Ein Audio-Frame wurde vom Server empfangen
    AudioEmpfangen(AudioFrame),
    /// Text-Nachricht (STT-Ergebnis oder TTS-Satz)
    TextNachricht { text: String, rolle: TextRolle },
    /// Rohe MCP-Nachricht (JSON-RPC, bereits an den Tool-Server geleitet)
    McpNachricht { payload: String },
    /// Emotions-Hinweis des Dialog-Modells
    EmotionNachricht { emotion: String },

    // --- Wiedergabe ---
    /// Zustandswechsel der Wiedergabe-Engine
    ZustandGewechselt {
        alt: WiedergabeZustand,
        neu: WiedergabeZustand,
    },

    // --- Fehler ---
    /// Fehler aus einem Subsystem (genau einmal pro Ursache gemeldet)
    Fehler {
        quelle: FehlerQuelle,
        nachricht: String,
    },
}

/// Ereignis mit Wanduhr-Zeitstempel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ereignis {
    /// Zeitpunkt der Entstehung (UTC)
    pub zeitpunkt: DateTime<Utc>,
    /// Inhalt des Ereignisses
    pub art: EreignisArt,
}

impl Ereignis {
    /// Erstellt ein Ereignis mit dem aktuellen Zeitstempel
    pub fn neu(art: EreignisArt) -> Self {
        Self {
            zeitpunkt: Utc::now(),
            art,
        }
    }
}

/// Callback-Typ fuer den registrierten Ereignis-Konsumenten
///
/// Wird von internen Threads aufgerufen und darf nicht blockieren.
pub type EreignisCallback = Box<dyn Fn(Ereignis) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ereignis_traegt_zeitstempel() {
        let vorher = Utc::now();
        let e = Ereignis::neu(EreignisArt::VerbindungHergestellt);
        let nachher = Utc::now();
        assert!(e.zeitpunkt >= vorher && e.zeitpunkt <= nachher);
    }

    #[test]
    fn ereignis_ist_serde_kompatibel() {
        let e = Ereignis::neu(EreignisArt::SessionAufgebaut {
            session_id: "abc".into(),
        });
        let json = serde_json::to_string(&e).unwrap();
        let decoded: Ereignis = serde_json::from_str(&json).unwrap();
        match decoded.art {
            EreignisArt::SessionAufgebaut { session_id } => assert_eq!(session_id, "abc"),
            other => panic!("Erwartet SessionAufgebaut, erhalten: {:?}", other),
        }
    }

    #[test]
    fn fehler_ereignis() {
        let e = Ereignis::neu(EreignisArt::Fehler {
            quelle: FehlerQuelle::Transport,
            nachricht: "Socket geschlossen".into(),
        });
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("transport"));
    }
}

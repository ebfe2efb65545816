//! Steuernachrichten (Text-Frames)
//!
//! Definiert alle JSON-Nachrichten die als WebSocket-Text-Frames zwischen
//! Client und Dialog-Server ausgetauscht werden.
//!
//! ## Design
//! - Jede Nachricht traegt ein `type`-Feld; die `session_id` wird
//!   mitgesendet sobald sie bekannt ist
//! - Ausgehende Nachrichten sind typisierte Builder, eingehende werden
//!   ueber ein Tagged Enum erkannt; unbekannte Typen bleiben als roher
//!   `serde_json::Value` fuer hoehere Schichten erhalten

use serde::{Deserialize, Serialize};

use voicelink_core::types::{AudioFormat, HoerModus};

// ---------------------------------------------------------------------------
// Client-Hello
// ---------------------------------------------------------------------------

/// Features die der Client im Hello ankuendigt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloFeatures {
    /// Client betreibt einen eingebetteten MCP-Tool-Server
    pub mcp: bool,
}

/// Audio-Parameter im Client-Hello
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloAudioParams {
    /// Codec-Name (immer "opus")
    pub format: String,
    pub sample_rate: u32,
    pub channels: u8,
    /// Frame-Dauer in Millisekunden
    pub frame_duration: u32,
}

/// Erste Nachricht des Clients nach dem Socket-Aufbau
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientHello {
    #[serde(rename = "type")]
    pub typ: String,
    pub version: u8,
    pub features: HelloFeatures,
    pub transport: String,
    pub audio_params: HelloAudioParams,
}

impl ClientHello {
    /// Erstellt das Client-Hello fuer die gegebene Protokollversion und
    /// das konfigurierte Sende-Format
    pub fn neu(version: u8, format: &AudioFormat) -> Self {
        Self {
            typ: "hello".into(),
            version,
            features: HelloFeatures { mcp: true },
            transport: "websocket".into(),
            audio_params: HelloAudioParams {
                format: "opus".into(),
                sample_rate: format.sample_rate,
                channels: format.channels,
                frame_duration: format.frame_duration_ms,
            },
        }
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Listen (detect / start / stop)
// ---------------------------------------------------------------------------

/// Ausgehende `listen`-Nachricht
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenNachricht {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub typ: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ListenNachricht {
    /// Hoeren starten mit dem gegebenen Modus
    pub fn start(session_id: Option<String>, modus: HoerModus) -> Self {
        Self {
            session_id,
            typ: "listen".into(),
            state: "start".into(),
            mode: Some(modus.als_wire().into()),
            text: None,
        }
    }

    /// Hoeren stoppen
    pub fn stop(session_id: Option<String>) -> Self {
        Self {
            session_id,
            typ: "listen".into(),
            state: "stop".into(),
            mode: None,
            text: None,
        }
    }

    /// Wake-Word-Erkennung melden
    pub fn detect(session_id: Option<String>, wake_word: impl Into<String>) -> Self {
        Self {
            session_id,
            typ: "listen".into(),
            state: "detect".into(),
            mode: None,
            text: Some(wake_word.into()),
        }
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Abort
// ---------------------------------------------------------------------------

/// Grund fuer einen Sprechabbruch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbbruchGrund {
    /// Wake-Word wurde waehrend der Server-Ausgabe erkannt
    WakeWordErkannt,
}

impl AbbruchGrund {
    /// Gibt den Wire-Wert fuer das `reason`-Feld zurueck
    pub fn als_wire(&self) -> &'static str {
        match self {
            AbbruchGrund::WakeWordErkannt => "wake_word_detected",
        }
    }
}

/// Ausgehende `abort`-Nachricht (Server soll zu sprechen aufhoeren)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbortNachricht {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AbortNachricht {
    /// Erstellt eine Abbruch-Nachricht, optional mit Grund
    pub fn neu(session_id: Option<String>, grund: Option<AbbruchGrund>) -> Self {
        Self {
            session_id,
            typ: "abort".into(),
            reason: grund.map(|g| g.als_wire().into()),
        }
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// MCP-Umschlag
// ---------------------------------------------------------------------------

/// Ausgehende `mcp`-Nachricht: transportiert eine JSON-RPC-Nachricht des
/// eingebetteten Tool-Servers zum Dialog-Server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpNachricht {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub typ: String,
    pub payload: serde_json::Value,
}

impl McpNachricht {
    /// Verpackt eine rohe JSON-RPC-Nachricht
    ///
    /// # Fehler
    /// Gibt einen Fehler zurueck wenn `payload` kein gueltiges JSON ist.
    pub fn neu(session_id: Option<String>, payload: &str) -> serde_json::Result<Self> {
        Ok(Self {
            session_id,
            typ: "mcp".into(),
            payload: serde_json::from_str(payload)?,
        })
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Eingehende Nachrichten
// ---------------------------------------------------------------------------

/// Audio-Parameter im Server-Hello (alle Felder optional)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerAudioParams {
    pub sample_rate: Option<u32>,
    pub frame_duration: Option<u32>,
}

/// Server-Hello: weist die Session zu und kann das Downlink-Format setzen
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerHello {
    pub transport: Option<String>,
    pub session_id: Option<String>,
    pub audio_params: Option<ServerAudioParams>,
}

/// Phase einer `tts`-Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsPhase {
    Start,
    Stop,
    SentenceStart,
    SentenceEnd,
    Unbekannt,
}

impl TtsPhase {
    /// Deutet den Wire-Wert des `state`-Felds
    pub fn aus_wire(wert: &str) -> Self {
        match wert {
            "start" => TtsPhase::Start,
            "stop" => TtsPhase::Stop,
            "sentence_start" => TtsPhase::SentenceStart,
            "sentence_end" => TtsPhase::SentenceEnd,
            _ => TtsPhase::Unbekannt,
        }
    }
}

// Unbekannte Phasen duerfen das Parsen der Gesamtnachricht nicht scheitern
// lassen, deshalb kein derive
impl<'de> serde::Deserialize<'de> for TtsPhase {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let wert = String::deserialize(deserializer)?;
        Ok(TtsPhase::aus_wire(&wert))
    }
}

/// Eingehende `tts`-Nachricht
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TtsNachricht {
    pub state: TtsPhase,
    pub text: Option<String>,
}

/// Eingehende `stt`-Nachricht (Transkription der Benutzer-Eingabe)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SttNachricht {
    pub text: String,
}

/// Eingehende `llm`-Nachricht (Emotions-Hinweis des Dialog-Modells)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmNachricht {
    pub emotion: Option<String>,
    pub text: Option<String>,
}

/// Eingehende `mcp`-Nachricht (JSON-RPC an den eingebetteten Tool-Server)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct McpEingang {
    pub payload: serde_json::Value,
}

/// Alle vom Client erkannten Server-Nachrichten
///
/// Unbekannte `type`-Werte schlagen beim Parsen fehl und werden von der
/// Engine als roher JSON-Wert weitergereicht.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerNachricht {
    Hello(ServerHello),
    Tts(TtsNachricht),
    Stt(SttNachricht),
    Llm(LlmNachricht),
    Mcp(McpEingang),
    Goodbye {
        session_id: Option<String>,
    },
}

impl ServerNachricht {
    /// Versucht einen JSON-Wert als bekannte Server-Nachricht zu deuten
    pub fn aus_wert(wert: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(wert.clone()).ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_hello_serialisierung() {
        let format = AudioFormat::neu(16000, 1, 60);
        let hello = ClientHello::neu(1, &format);
        let json = hello.to_json().unwrap();
        let wert: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(wert["type"], "hello");
        assert_eq!(wert["version"], 1);
        assert_eq!(wert["features"]["mcp"], true);
        assert_eq!(wert["transport"], "websocket");
        assert_eq!(wert["audio_params"]["format"], "opus");
        assert_eq!(wert["audio_params"]["sample_rate"], 16000);
        assert_eq!(wert["audio_params"]["channels"], 1);
        assert_eq!(wert["audio_params"]["frame_duration"], 60);
    }

    #[test]
    fn listen_start_serialisierung() {
        let msg = ListenNachricht::start(Some("abc".into()), HoerModus::Auto);
        let json = msg.to_json().unwrap();
        let wert: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(wert["session_id"], "abc");
        assert_eq!(wert["type"], "listen");
        assert_eq!(wert["state"], "start");
        assert_eq!(wert["mode"], "auto");
        assert!(wert.get("text").is_none());
    }

    #[test]
    fn listen_stop_ohne_mode() {
        let msg = ListenNachricht::stop(Some("abc".into()));
        let json = msg.to_json().unwrap();
        let wert: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(wert["state"], "stop");
        assert!(wert.get("mode").is_none());
    }

    #[test]
    fn listen_detect_traegt_wake_word() {
        let msg = ListenNachricht::detect(None, "Hey Nova");
        let json = msg.to_json().unwrap();
        let wert: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(wert["state"], "detect");
        assert_eq!(wert["text"], "Hey Nova");
        // Ohne Session darf kein session_id-Feld erscheinen
        assert!(wert.get("session_id").is_none());
    }

    #[test]
    fn abort_mit_grund() {
        let msg = AbortNachricht::neu(Some("s1".into()), Some(AbbruchGrund::WakeWordErkannt));
        let json = msg.to_json().unwrap();
        let wert: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(wert["type"], "abort");
        assert_eq!(wert["reason"], "wake_word_detected");
    }

    #[test]
    fn abort_ohne_grund() {
        let msg = AbortNachricht::neu(None, None);
        let json = msg.to_json().unwrap();
        let wert: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(wert.get("reason").is_none());
    }

    #[test]
    fn mcp_umschlag_mit_rohem_json() {
        let msg = McpNachricht::neu(Some("s1".into()), r#"{"jsonrpc":"2.0","id":1}"#).unwrap();
        let json = msg.to_json().unwrap();
        let wert: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(wert["type"], "mcp");
        assert_eq!(wert["payload"]["jsonrpc"], "2.0");
        assert_eq!(wert["payload"]["id"], 1);
    }

    #[test]
    fn mcp_umschlag_ungueltiges_json() {
        assert!(McpNachricht::neu(None, "kein json").is_err());
    }

    #[test]
    fn server_hello_parsen() {
        let wert: serde_json::Value = serde_json::from_str(
            r#"{"type":"hello","transport":"websocket","session_id":"abc",
                "audio_params":{"sample_rate":24000,"frame_duration":60}}"#,
        )
        .unwrap();
        match ServerNachricht::aus_wert(&wert) {
            Some(ServerNachricht::Hello(h)) => {
                assert_eq!(h.transport.as_deref(), Some("websocket"));
                assert_eq!(h.session_id.as_deref(), Some("abc"));
                let params = h.audio_params.unwrap();
                assert_eq!(params.sample_rate, Some(24000));
                assert_eq!(params.frame_duration, Some(60));
            }
            other => panic!("Erwartet Hello, erhalten: {:?}", other),
        }
    }

    #[test]
    fn tts_phasen_parsen() {
        let wert: serde_json::Value =
            serde_json::from_str(r#"{"type":"tts","state":"start"}"#).unwrap();
        match ServerNachricht::aus_wert(&wert) {
            Some(ServerNachricht::Tts(t)) => assert_eq!(t.state, TtsPhase::Start),
            other => panic!("Erwartet Tts, erhalten: {:?}", other),
        }

        let wert: serde_json::Value =
            serde_json::from_str(r#"{"type":"tts","state":"sentence_start","text":"Hallo"}"#)
                .unwrap();
        match ServerNachricht::aus_wert(&wert) {
            Some(ServerNachricht::Tts(t)) => {
                assert_eq!(t.state, TtsPhase::SentenceStart);
                assert_eq!(t.text.as_deref(), Some("Hallo"));
            }
            other => panic!("Erwartet Tts, erhalten: {:?}", other),
        }
    }

    #[test]
    fn tts_unbekannte_phase() {
        let wert: serde_json::Value =
            serde_json::from_str(r#"{"type":"tts","state":"irgendwas"}"#).unwrap();
        match ServerNachricht::aus_wert(&wert) {
            Some(ServerNachricht::Tts(t)) => assert_eq!(t.state, TtsPhase::Unbekannt),
            other => panic!("Erwartet Tts, erhalten: {:?}", other),
        }
    }

    #[test]
    fn goodbye_parsen() {
        let wert: serde_json::Value =
            serde_json::from_str(r#"{"type":"goodbye","session_id":"abc"}"#).unwrap();
        assert!(matches!(
            ServerNachricht::aus_wert(&wert),
            Some(ServerNachricht::Goodbye { .. })
        ));
    }

    #[test]
    fn unbekannter_typ_bleibt_roh() {
        let wert: serde_json::Value =
            serde_json::from_str(r#"{"type":"custom","data":42}"#).unwrap();
        assert!(ServerNachricht::aus_wert(&wert).is_none());
    }
}

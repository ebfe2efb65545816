//! Session-Protokoll-Engine
//!
//! Baut die WebSocket-Verbindung auf (Upgrade-Anfrage mit Auth-Headern),
//! sendet das Client-Hello und pumpt danach in einer tokio-Task Befehle
//! hinaus und Server-Frames herein. Text-Nachrichten werden nach dem
//! internen Zustands-Update als rohes JSON weitergereicht; Binaer-Frames
//! werden gemaess der konfigurierten Protokollversion entrahmt.
//!
//! Reihenfolge-Garantie: fuer jede einzelne Server-Nachricht wird zuerst
//! der Session-Zustand aktualisiert und danach das Ereignis emittiert.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use voicelink_core::types::{AudioFormat, AudioFrame, HoerModus};
use voicelink_protocol::control::{
    AbbruchGrund, AbortNachricht, ClientHello, ListenNachricht, McpNachricht, ServerNachricht,
};
use voicelink_protocol::wire::{audio_auspacken, audio_einpacken, WireVersion};

use crate::error::{SessionError, SessionResult};
use crate::state::SessionZustand;

type WsStrom = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Kapazitaet des Befehls-Kanals (Audio-Frames + Steuernachrichten)
const BEFEHL_KAPAZITAET: usize = 64;

/// Kapazitaet des Ereignis-Kanals zur Fassade
const EREIGNIS_KAPAZITAET: usize = 256;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Konfiguration der Session-Engine
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket-URL des Dialog-Servers
    pub url: String,
    /// Bearer-Token (optional); "Bearer " wird nur vorangestellt wenn der
    /// Token noch keinen Leerraum enthaelt
    pub auth_token: Option<String>,
    /// Geraete-Kennung (optional)
    pub device_id: Option<String>,
    /// Client-Kennung (optional)
    pub client_id: Option<String>,
    /// Protokollversion (1, 2 oder 3); bestimmt das Binaer-Framing
    pub protocol_version: u8,
    /// Uplink-Format fuer das Client-Hello
    pub format: AudioFormat,
    /// Frist fuer den Verbindungsaufbau
    pub verbindungs_frist: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_token: None,
            device_id: None,
            client_id: None,
            protocol_version: 3,
            format: AudioFormat::default(),
            verbindungs_frist: Duration::from_millis(5000),
        }
    }
}

// ---------------------------------------------------------------------------
// Ereignisse und Befehle
// ---------------------------------------------------------------------------

/// Ereignisse der Engine an die Fassade
#[derive(Debug, Clone)]
pub enum SessionEreignis {
    /// Socket steht, Client-Hello wurde gesendet
    Verbunden,
    /// Verbindung beendet (regulaer oder nach Fehler)
    Getrennt { grund: String },
    /// Server-Hello verarbeitet, Session zugewiesen
    HelloEmpfangen { session_id: Option<String> },
    /// Jede Text-Nachricht als rohes JSON (nach dem Zustands-Update)
    Json(serde_json::Value),
    /// Entrahmter Audio-Frame des Servers
    Audio(AudioFrame),
    /// Transportfehler (genau einmal gemeldet)
    NetzwerkFehler { nachricht: String },
}

/// Befehle an die Pump-Task
#[derive(Debug)]
pub enum SessionBefehl {
    /// Text-Frame senden
    Text(String),
    /// Audio-Frame rahmen und als Binaer-Frame senden
    Audio(AudioFrame),
    /// Verbindung sauber schliessen
    Schliessen,
}

// ---------------------------------------------------------------------------
// SessionEngine
// ---------------------------------------------------------------------------

/// Protokoll-Engine; besitzt die Verbindung und den Session-Zustand
pub struct SessionEngine {
    config: SessionConfig,
    zustand: Arc<SessionZustand>,
    wire_version: WireVersion,
    ereignis_tx: mpsc::Sender<SessionEreignis>,
    befehl_tx: Mutex<Option<mpsc::Sender<SessionBefehl>>>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SessionEngine {
    /// Erstellt die Engine und den Ereignis-Kanal zur Fassade
    pub fn neu(
        config: SessionConfig,
    ) -> SessionResult<(Self, mpsc::Receiver<SessionEreignis>)> {
        if config.url.is_empty() {
            return Err(SessionError::UngueltigeKonfiguration(
                "Server-URL darf nicht leer sein".into(),
            ));
        }
        if !(1..=3).contains(&config.protocol_version) {
            return Err(SessionError::UngueltigeKonfiguration(format!(
                "Protokollversion muss 1, 2 oder 3 sein (war: {})",
                config.protocol_version
            )));
        }

        let (ereignis_tx, ereignis_rx) = mpsc::channel(EREIGNIS_KAPAZITAET);
        let wire_version = WireVersion::aus_protokollversion(config.protocol_version);
        Ok((
            Self {
                config,
                zustand: Arc::new(SessionZustand::neu()),
                wire_version,
                ereignis_tx,
                befehl_tx: Mutex::new(None),
                task: Mutex::new(None),
            },
            ereignis_rx,
        ))
    }

    /// Baut die Verbindung auf, sendet das Client-Hello und startet die
    /// Pump-Task
    pub async fn start(&self) -> SessionResult<()> {
        if self.task.lock().is_some() {
            return Err(SessionError::UngueltigerZustand(
                "Engine bereits gestartet".into(),
            ));
        }

        let anfrage = upgrade_anfrage_bauen(&self.config)?;
        info!(url = %self.config.url, "Verbinde mit Dialog-Server");

        let verbinden = connect_async(anfrage);
        let (mut ws, _antwort) =
            match tokio::time::timeout(self.config.verbindungs_frist, verbinden).await {
                Ok(Ok(erfolg)) => erfolg,
                Ok(Err(e)) => return Err(SessionError::VerbindungFehlgeschlagen(e.to_string())),
                Err(_) => return Err(SessionError::Zeitlimit),
            };

        // Client-Hello unmittelbar nach dem Socket-Aufbau
        let hello = ClientHello::neu(self.config.protocol_version, &self.config.format)
            .to_json()
            .map_err(|e| SessionError::UngueltigeNachricht(e.to_string()))?;
        ws.send(Message::Text(hello.into()))
            .await
            .map_err(|e| SessionError::Handshake(e.to_string()))?;

        self.zustand.verbunden_setzen(true);
        self.zustand.eingang_vermerken();
        let _ = self.ereignis_tx.send(SessionEreignis::Verbunden).await;

        let (befehl_tx, befehl_rx) = mpsc::channel(BEFEHL_KAPAZITAET);
        *self.befehl_tx.lock() = Some(befehl_tx);

        let zustand = Arc::clone(&self.zustand);
        let ereignis_tx = self.ereignis_tx.clone();
        let wire_version = self.wire_version;
        let task = tokio::spawn(async move {
            pumpe(ws, befehl_rx, zustand, wire_version, ereignis_tx).await;
        });
        *self.task.lock() = Some(task);

        info!("Session-Engine gestartet");
        Ok(())
    }

    /// Schliesst die Verbindung und wartet auf das Ende der Pump-Task
    pub async fn stop(&self) {
        let befehl_tx = self.befehl_tx.lock().take();
        if let Some(tx) = befehl_tx {
            let _ = tx.send(SessionBefehl::Schliessen).await;
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            if tokio::time::timeout(Duration::from_secs(2), task)
                .await
                .is_err()
            {
                warn!("Pump-Task beendete sich nicht rechtzeitig");
            }
        }
        self.zustand.verbunden_setzen(false);
        info!("Session-Engine gestoppt");
    }

    /// Gibt ein klonbares Handle fuer Sende-Operationen zurueck
    ///
    /// # Fehler
    /// `NichtVerbunden` solange die Engine nicht gestartet ist.
    pub fn handle(&self) -> SessionResult<SessionHandle> {
        let befehl_tx = self
            .befehl_tx
            .lock()
            .clone()
            .ok_or(SessionError::NichtVerbunden)?;
        Ok(SessionHandle {
            zustand: Arc::clone(&self.zustand),
            befehl_tx,
        })
    }

    pub fn ist_verbunden(&self) -> bool {
        self.zustand.ist_verbunden()
    }

    pub fn ist_timeout(&self) -> bool {
        self.zustand.ist_timeout()
    }

    pub fn session_id(&self) -> Option<String> {
        self.zustand.session_id()
    }

    pub fn hello_empfangen(&self) -> bool {
        self.zustand.hello_empfangen()
    }

    /// Downlink-Format (sample_rate, frame_duration_ms)
    pub fn server_format(&self) -> (u32, u32) {
        self.zustand.server_format()
    }

    pub fn fehler_aufgetreten(&self) -> bool {
        self.zustand.fehler_aufgetreten()
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Klonbares Sende-Handle; nutzbar von Threads und Tasks
#[derive(Clone)]
pub struct SessionHandle {
    zustand: Arc<SessionZustand>,
    befehl_tx: mpsc::Sender<SessionBefehl>,
}

impl SessionHandle {
    fn befehl_senden(&self, befehl: SessionBefehl) -> SessionResult<()> {
        if !self.zustand.ist_verbunden() {
            return Err(SessionError::NichtVerbunden);
        }
        self.befehl_tx
            .try_send(befehl)
            .map_err(|e| SessionError::SendenFehlgeschlagen(e.to_string()))
    }

    /// Sendet einen kodierten Audio-Frame (Framing uebernimmt die Pump-Task)
    pub fn audio_senden(&self, frame: AudioFrame) -> SessionResult<()> {
        self.befehl_senden(SessionBefehl::Audio(frame))
    }

    /// Sendet einen rohen Text-Frame
    pub fn text_senden(&self, text: String) -> SessionResult<()> {
        self.befehl_senden(SessionBefehl::Text(text))
    }

    /// Meldet ein erkanntes Wake-Word
    pub fn wake_word_melden(&self, wort: &str) -> SessionResult<()> {
        let nachricht = ListenNachricht::detect(self.zustand.session_id(), wort)
            .to_json()
            .map_err(|e| SessionError::UngueltigeNachricht(e.to_string()))?;
        self.text_senden(nachricht)
    }

    /// Fordert den Start des Hoerens an
    pub fn hoeren_starten(&self, modus: HoerModus) -> SessionResult<()> {
        let nachricht = ListenNachricht::start(self.zustand.session_id(), modus)
            .to_json()
            .map_err(|e| SessionError::UngueltigeNachricht(e.to_string()))?;
        self.text_senden(nachricht)
    }

    /// Fordert das Ende des Hoerens an
    pub fn hoeren_stoppen(&self) -> SessionResult<()> {
        let nachricht = ListenNachricht::stop(self.zustand.session_id())
            .to_json()
            .map_err(|e| SessionError::UngueltigeNachricht(e.to_string()))?;
        self.text_senden(nachricht)
    }

    /// Fordert den Abbruch der Server-Ausgabe an (genau ein Text-Frame;
    /// die Wiedergabe laeuft weiter bis der Server `tts stop` sendet)
    pub fn abbrechen(&self, grund: Option<AbbruchGrund>) -> SessionResult<()> {
        let nachricht = AbortNachricht::neu(self.zustand.session_id(), grund)
            .to_json()
            .map_err(|e| SessionError::UngueltigeNachricht(e.to_string()))?;
        self.text_senden(nachricht)
    }

    /// Verpackt eine JSON-RPC-Nachricht des Tool-Servers in den MCP-Umschlag
    pub fn mcp_senden(&self, payload: &str) -> SessionResult<()> {
        let nachricht = McpNachricht::neu(self.zustand.session_id(), payload)
            .and_then(|n| n.to_json())
            .map_err(|e| SessionError::UngueltigeNachricht(e.to_string()))?;
        self.text_senden(nachricht)
    }

    pub fn session_id(&self) -> Option<String> {
        self.zustand.session_id()
    }

    pub fn ist_verbunden(&self) -> bool {
        self.zustand.ist_verbunden()
    }

    pub fn ist_timeout(&self) -> bool {
        self.zustand.ist_timeout()
    }
}

// ---------------------------------------------------------------------------
// Upgrade-Anfrage
// ---------------------------------------------------------------------------

/// Baut die HTTP-Upgrade-Anfrage mit den konfigurierten Headern
pub(crate) fn upgrade_anfrage_bauen(config: &SessionConfig) -> SessionResult<Request> {
    let mut anfrage = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| SessionError::UngueltigeKonfiguration(e.to_string()))?;

    let header = anfrage.headers_mut();

    if let Some(token) = &config.auth_token {
        // "Bearer " nur voranstellen wenn der Token keinen Leerraum enthaelt
        let wert = if token.chars().any(char::is_whitespace) {
            token.clone()
        } else {
            format!("Bearer {}", token)
        };
        header.insert(
            "Authorization",
            HeaderValue::from_str(&wert)
                .map_err(|e| SessionError::UngueltigeKonfiguration(e.to_string()))?,
        );
    }

    header.insert(
        "Protocol-Version",
        HeaderValue::from_str(&config.protocol_version.to_string())
            .map_err(|e| SessionError::UngueltigeKonfiguration(e.to_string()))?,
    );

    if let Some(device_id) = &config.device_id {
        header.insert(
            "Device-Id",
            HeaderValue::from_str(device_id)
                .map_err(|e| SessionError::UngueltigeKonfiguration(e.to_string()))?,
        );
    }
    if let Some(client_id) = &config.client_id {
        header.insert(
            "Client-Id",
            HeaderValue::from_str(client_id)
                .map_err(|e| SessionError::UngueltigeKonfiguration(e.to_string()))?,
        );
    }

    Ok(anfrage)
}

// ---------------------------------------------------------------------------
// Pump-Task
// ---------------------------------------------------------------------------

async fn pumpe(
    ws: WsStrom,
    mut befehl_rx: mpsc::Receiver<SessionBefehl>,
    zustand: Arc<SessionZustand>,
    wire_version: WireVersion,
    ereignis_tx: mpsc::Sender<SessionEreignis>,
) {
    let (mut senke, mut strom) = ws.split();
    let mut grund = String::from("Verbindung beendet");

    debug!("Pump-Task gestartet");

    loop {
        tokio::select! {
            befehl = befehl_rx.recv() => match befehl {
                Some(SessionBefehl::Text(text)) => {
                    trace!(laenge = text.len(), "Text-Frame senden");
                    if let Err(e) = senke.send(Message::Text(text.into())).await {
                        zustand.fehler_setzen();
                        grund = e.to_string();
                        let _ = ereignis_tx
                            .send(SessionEreignis::NetzwerkFehler { nachricht: grund.clone() })
                            .await;
                        break;
                    }
                }
                Some(SessionBefehl::Audio(frame)) => {
                    match audio_einpacken(wire_version, frame.timestamp_ms, &frame.payload) {
                        Ok(bytes) => {
                            if let Err(e) = senke.send(Message::Binary(bytes.into())).await {
                                zustand.fehler_setzen();
                                grund = e.to_string();
                                let _ = ereignis_tx
                                    .send(SessionEreignis::NetzwerkFehler {
                                        nachricht: grund.clone(),
                                    })
                                    .await;
                                break;
                            }
                        }
                        Err(e) => warn!("Audio-Frame nicht rahmbar: {}", e),
                    }
                }
                Some(SessionBefehl::Schliessen) | None => {
                    let _ = senke.send(Message::Close(None)).await;
                    grund = "Vom Client geschlossen".into();
                    break;
                }
            },
            nachricht = strom.next() => match nachricht {
                Some(Ok(Message::Text(text))) => {
                    zustand.eingang_vermerken();
                    for ereignis in text_verarbeiten(&zustand, text.as_str()) {
                        if ereignis_tx.send(ereignis).await.is_err() {
                            return;
                        }
                    }
                }
                Some(Ok(Message::Binary(daten))) => {
                    zustand.eingang_vermerken();
                    match binaer_verarbeiten(&zustand, wire_version, &daten) {
                        Ok(Some(frame)) => {
                            let _ = ereignis_tx.send(SessionEreignis::Audio(frame)).await;
                        }
                        Ok(None) => {}
                        Err(e) => warn!("Binaer-Frame verworfen: {}", e),
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    grund = "Vom Server geschlossen".into();
                    break;
                }
                // Ping/Pong beantwortet tungstenite selbststaendig
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    zustand.fehler_setzen();
                    grund = e.to_string();
                    let _ = ereignis_tx
                        .send(SessionEreignis::NetzwerkFehler { nachricht: grund.clone() })
                        .await;
                    break;
                }
                None => {
                    grund = "Strom beendet".into();
                    break;
                }
            }
        }
    }

    zustand.verbunden_setzen(false);
    let _ = ereignis_tx.send(SessionEreignis::Getrennt { grund }).await;
    debug!("Pump-Task beendet");
}

// ---------------------------------------------------------------------------
// Nachrichtenverarbeitung (testbar ohne Socket)
// ---------------------------------------------------------------------------

/// Verarbeitet eine Text-Nachricht: aktualisiert zuerst den Zustand und
/// liefert danach die zu emittierenden Ereignisse (das rohe JSON immer
/// als letztes)
pub(crate) fn text_verarbeiten(
    zustand: &SessionZustand,
    text: &str,
) -> Vec<SessionEreignis> {
    let wert: serde_json::Value = match serde_json::from_str(text) {
        Ok(wert) => wert,
        Err(e) => {
            warn!("Text-Frame ist kein gueltiges JSON, verworfen: {}", e);
            return Vec::new();
        }
    };
    if !wert.get("type").map(serde_json::Value::is_string).unwrap_or(false) {
        warn!("Text-Frame ohne type-Feld verworfen");
        return Vec::new();
    }

    let mut ereignisse = Vec::new();

    match ServerNachricht::aus_wert(&wert) {
        Some(ServerNachricht::Hello(hello)) => {
            if hello.transport.as_deref() == Some("websocket") {
                zustand.hello_empfangen_setzen();
                zustand.session_id_setzen(hello.session_id.clone());
                if let Some(params) = &hello.audio_params {
                    zustand.server_format_setzen(params.sample_rate, params.frame_duration);
                }
                debug!(session_id = ?hello.session_id, "Server-Hello verarbeitet");
                ereignisse.push(SessionEreignis::HelloEmpfangen {
                    session_id: hello.session_id,
                });
            } else {
                warn!(transport = ?hello.transport, "Server-Hello mit fremdem Transport ignoriert");
            }
        }
        Some(ServerNachricht::Goodbye { .. }) => {
            debug!("Goodbye empfangen, Session beendet");
            zustand.session_id_setzen(None);
        }
        // tts/stt/llm/mcp und Unbekanntes behandelt die Fassade
        _ => {}
    }

    ereignisse.push(SessionEreignis::Json(wert));
    ereignisse
}

/// Entrahmt einen Binaer-Frame; Timing-Metadaten kommen aus dem
/// Server-Format (Standardwerte bis zum Server-Hello)
pub(crate) fn binaer_verarbeiten(
    zustand: &SessionZustand,
    wire_version: WireVersion,
    daten: &[u8],
) -> std::io::Result<Option<AudioFrame>> {
    let empfangen = audio_auspacken(wire_version, daten)?;
    Ok(empfangen.map(|audio| {
        let (sample_rate, frame_dauer) = zustand.server_format();
        AudioFrame::neu(sample_rate, frame_dauer, audio.timestamp_ms, audio.payload)
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{STANDARD_SERVER_FRAME_DAUER, STANDARD_SERVER_SAMPLE_RATE};

    fn test_config() -> SessionConfig {
        SessionConfig {
            url: "ws://h:1/path".into(),
            auth_token: Some("token123".into()),
            device_id: Some("aa:bb:cc:dd:ee:ff".into()),
            client_id: Some("client-1".into()),
            protocol_version: 1,
            format: AudioFormat::default(),
            verbindungs_frist: Duration::from_millis(500),
        }
    }

    #[test]
    fn anfrage_mit_allen_headern() {
        let anfrage = upgrade_anfrage_bauen(&test_config()).unwrap();
        let header = anfrage.headers();
        assert_eq!(header.get("Authorization").unwrap(), "Bearer token123");
        assert_eq!(header.get("Protocol-Version").unwrap(), "1");
        assert_eq!(header.get("Device-Id").unwrap(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(header.get("Client-Id").unwrap(), "client-1");
    }

    #[test]
    fn bearer_nicht_doppelt_vorangestellt() {
        let mut config = test_config();
        config.auth_token = Some("Bearer schon-da".into());
        let anfrage = upgrade_anfrage_bauen(&config).unwrap();
        assert_eq!(
            anfrage.headers().get("Authorization").unwrap(),
            "Bearer schon-da"
        );
    }

    #[test]
    fn abwesende_felder_ohne_header() {
        let mut config = test_config();
        config.auth_token = None;
        config.device_id = None;
        config.client_id = None;
        let anfrage = upgrade_anfrage_bauen(&config).unwrap();
        let header = anfrage.headers();
        assert!(header.get("Authorization").is_none());
        assert!(header.get("Device-Id").is_none());
        assert!(header.get("Client-Id").is_none());
        assert!(header.get("Protocol-Version").is_some());
    }

    #[test]
    fn neu_validiert_konfiguration() {
        let mut config = test_config();
        config.url = String::new();
        assert!(SessionEngine::neu(config).is_err());

        let mut config = test_config();
        config.protocol_version = 4;
        assert!(SessionEngine::neu(config).is_err());
    }

    #[test]
    fn handle_vor_start_schlaegt_fehl() {
        let (engine, _rx) = SessionEngine::neu(test_config()).unwrap();
        // Senden vor dem Socket-Aufbau ist ein synchroner Fehler
        assert!(matches!(engine.handle(), Err(SessionError::NichtVerbunden)));
        assert!(!engine.ist_verbunden());
    }

    #[test]
    fn server_hello_setzt_zustand() {
        let zustand = SessionZustand::neu();
        let ereignisse = text_verarbeiten(
            &zustand,
            r#"{"type":"hello","transport":"websocket","session_id":"abc",
                "audio_params":{"sample_rate":24000,"frame_duration":60}}"#,
        );

        assert!(zustand.hello_empfangen());
        assert_eq!(zustand.session_id().as_deref(), Some("abc"));
        assert_eq!(zustand.server_format(), (24000, 60));

        // Erst das Hello-Ereignis, dann das rohe JSON
        assert_eq!(ereignisse.len(), 2);
        assert!(matches!(
            &ereignisse[0],
            SessionEreignis::HelloEmpfangen { session_id: Some(id) } if id == "abc"
        ));
        assert!(matches!(&ereignisse[1], SessionEreignis::Json(_)));
    }

    #[test]
    fn hello_mit_fremdem_transport_laesst_zustand_unveraendert() {
        let zustand = SessionZustand::neu();
        let ereignisse = text_verarbeiten(
            &zustand,
            r#"{"type":"hello","transport":"udp","session_id":"abc"}"#,
        );

        assert!(!zustand.hello_empfangen());
        assert_eq!(zustand.session_id(), None);
        assert_eq!(
            zustand.server_format(),
            (STANDARD_SERVER_SAMPLE_RATE, STANDARD_SERVER_FRAME_DAUER)
        );
        // Das rohe JSON wird trotzdem weitergereicht
        assert_eq!(ereignisse.len(), 1);
        assert!(matches!(&ereignisse[0], SessionEreignis::Json(_)));
    }

    #[test]
    fn hello_ohne_audio_params_behaelt_standardwerte() {
        let zustand = SessionZustand::neu();
        text_verarbeiten(
            &zustand,
            r#"{"type":"hello","transport":"websocket","session_id":"s"}"#,
        );
        assert_eq!(
            zustand.server_format(),
            (STANDARD_SERVER_SAMPLE_RATE, STANDARD_SERVER_FRAME_DAUER)
        );
    }

    #[test]
    fn goodbye_leert_session_id() {
        let zustand = SessionZustand::neu();
        zustand.session_id_setzen(Some("abc".into()));
        let ereignisse = text_verarbeiten(&zustand, r#"{"type":"goodbye"}"#);
        assert_eq!(zustand.session_id(), None);
        assert_eq!(ereignisse.len(), 1);
    }

    #[test]
    fn tts_wird_als_json_weitergereicht() {
        let zustand = SessionZustand::neu();
        let ereignisse = text_verarbeiten(&zustand, r#"{"type":"tts","state":"start"}"#);
        assert_eq!(ereignisse.len(), 1);
        match &ereignisse[0] {
            SessionEreignis::Json(wert) => assert_eq!(wert["type"], "tts"),
            other => panic!("Erwartet Json, erhalten: {:?}", other),
        }
    }

    #[test]
    fn kaputtes_json_wird_verworfen() {
        let zustand = SessionZustand::neu();
        assert!(text_verarbeiten(&zustand, "{kein json").is_empty());
    }

    #[test]
    fn nachricht_ohne_type_wird_verworfen() {
        let zustand = SessionZustand::neu();
        assert!(text_verarbeiten(&zustand, r#"{"data":42}"#).is_empty());
    }

    #[test]
    fn binaer_v3_mit_server_format() {
        let zustand = SessionZustand::neu();
        zustand.server_format_setzen(Some(24000), Some(60));

        let frame_bytes = audio_einpacken(WireVersion::V3, 0, &[0xAA; 120]).unwrap();
        let frame = binaer_verarbeiten(&zustand, WireVersion::V3, &frame_bytes)
            .unwrap()
            .expect("Audio-Frame erwartet");
        assert_eq!(frame.sample_rate, 24000);
        assert_eq!(frame.frame_duration_ms, 60);
        assert_eq!(frame.timestamp_ms, 0);
        assert_eq!(frame.payload.len(), 120);
    }

    #[test]
    fn binaer_v2_traegt_zeitstempel() {
        let zustand = SessionZustand::neu();
        let frame_bytes = audio_einpacken(WireVersion::V2, 777, &[1, 2, 3]).unwrap();
        let frame = binaer_verarbeiten(&zustand, WireVersion::V2, &frame_bytes)
            .unwrap()
            .unwrap();
        assert_eq!(frame.timestamp_ms, 777);
    }

    #[test]
    fn binaer_vor_hello_nutzt_standardwerte() {
        let zustand = SessionZustand::neu();
        let frame_bytes = audio_einpacken(WireVersion::V3, 0, &[5; 10]).unwrap();
        let frame = binaer_verarbeiten(&zustand, WireVersion::V3, &frame_bytes)
            .unwrap()
            .unwrap();
        assert_eq!(frame.sample_rate, STANDARD_SERVER_SAMPLE_RATE);
        assert_eq!(frame.frame_duration_ms, STANDARD_SERVER_FRAME_DAUER);
    }

    #[test]
    fn binaer_fremder_typ_wird_ignoriert() {
        let zustand = SessionZustand::neu();
        let mut frame_bytes = audio_einpacken(WireVersion::V3, 0, &[5; 10]).unwrap();
        frame_bytes[0] = 9;
        let ergebnis = binaer_verarbeiten(&zustand, WireVersion::V3, &frame_bytes).unwrap();
        assert!(ergebnis.is_none());
    }

    #[tokio::test]
    async fn start_gegen_geschlossenen_port_schlaegt_fehl() {
        let mut config = test_config();
        config.url = "ws://127.0.0.1:9/ws".into();
        let (engine, _rx) = SessionEngine::neu(config).unwrap();
        let ergebnis = engine.start().await;
        assert!(ergebnis.is_err());
        assert!(!engine.ist_verbunden());
    }

    #[tokio::test]
    async fn doppelter_start_ohne_verbindung() {
        let mut config = test_config();
        config.url = "ws://127.0.0.1:9/ws".into();
        config.verbindungs_frist = Duration::from_millis(200);
        let (engine, _rx) = SessionEngine::neu(config).unwrap();
        let _ = engine.start().await;
        // Nach dem Fehlschlag ist kein Task aktiv, erneuter Versuch erlaubt
        let ergebnis = engine.start().await;
        assert!(ergebnis.is_err());
    }
}

//! VoicelinkClient – die Fassade des SDK
//!
//! Besitzt Geraet, Codecs, Wiedergabe-Engine, Session-Engine und
//! Tool-Server und steuert deren Lebenszyklus. Der Abbau folgt der
//! festen Reihenfolge Capture → Wiedergabe → Session → Geraet; jede
//! Komponente weckt beim Stoppen ihre blockierten Threads.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn};

use voicelink_audio::codec::{AudioCodec, OpusCodec};
use voicelink_audio::cpal_backend::CpalGeraet;
use voicelink_audio::device::{AudioGeraet, GeraetKonfig};
use voicelink_audio::error::AudioError;
use voicelink_audio::playback::{PlaybackEngine, WiedergabeKonfig};
use voicelink_core::config::ClientConfig;
use voicelink_core::event::{Ereignis, EreignisArt, EreignisCallback};
use voicelink_core::types::{AudioFormat, AudioFrame, HoerModus};
use voicelink_core::{Result, VoicelinkError};
use voicelink_mcp::McpServer;
use voicelink_protocol::control::AbbruchGrund;
use voicelink_session::engine::{SessionConfig, SessionEngine, SessionEreignis, SessionHandle};
use voicelink_session::error::SessionError;
use voicelink_session::state::STANDARD_SERVER_FRAME_DAUER;

use crate::capture::{AudioVersand, CaptureWorker};
use crate::fanout::{EreignisFanout, FacadeZustand, Steuerkanal};

// ---------------------------------------------------------------------------
// Fehler-Konvertierung
// ---------------------------------------------------------------------------

fn session_fehler(e: SessionError) -> VoicelinkError {
    match e {
        SessionError::NichtVerbunden => VoicelinkError::NichtVerbunden,
        SessionError::Zeitlimit => VoicelinkError::Zeitlimit("Verbindungsaufbau".into()),
        SessionError::UngueltigeKonfiguration(msg) => VoicelinkError::Konfiguration(msg),
        SessionError::UngueltigerZustand(msg) => VoicelinkError::UngueltigerZustand(msg),
        andere => VoicelinkError::Verbindung(andere.to_string()),
    }
}

fn audio_fehler(e: AudioError) -> VoicelinkError {
    VoicelinkError::Audio(e.to_string())
}

// ---------------------------------------------------------------------------
// Session-Handle als Steuerkanal und Audio-Versand
// ---------------------------------------------------------------------------

impl Steuerkanal for SessionHandle {
    fn hoeren_starten(&self, modus: HoerModus) -> Result<()> {
        SessionHandle::hoeren_starten(self, modus).map_err(session_fehler)
    }

    fn hoeren_stoppen(&self) -> Result<()> {
        SessionHandle::hoeren_stoppen(self).map_err(session_fehler)
    }

    fn mcp_senden(&self, payload: &str) -> Result<()> {
        SessionHandle::mcp_senden(self, payload).map_err(session_fehler)
    }
}

impl AudioVersand for SessionHandle {
    fn audio_senden(&self, frame: AudioFrame) -> Result<()> {
        SessionHandle::audio_senden(self, frame).map_err(session_fehler)
    }
}

// ---------------------------------------------------------------------------
// VoicelinkClient
// ---------------------------------------------------------------------------

/// Fassade des Voicelink-SDK
pub struct VoicelinkClient {
    config: ClientConfig,
    geraet: Arc<dyn AudioGeraet>,
    playback: Arc<PlaybackEngine>,
    mcp: Arc<Mutex<McpServer>>,
    engine: SessionEngine,
    ereignis_rx: Mutex<Option<mpsc::Receiver<SessionEreignis>>>,
    callback: Arc<OnceLock<EreignisCallback>>,
    sende_gate: Arc<AtomicBool>,
    capture_codec: Mutex<Option<Box<dyn AudioCodec>>>,
    capture: Mutex<Option<CaptureWorker>>,
    fanout: Mutex<Option<EreignisFanout>>,
    fanout_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl VoicelinkClient {
    /// Erstellt den Client mit cpal-Geraet und Opus-Codecs
    pub fn neu(config: ClientConfig) -> Result<Self> {
        let geraet = Arc::new(CpalGeraet::neu(
            config.audio.input_device.clone(),
            config.audio.output_device.clone(),
        ));
        let capture_format = AudioFormat::neu(
            config.audio.sample_rate,
            config.audio.channels,
            config.audio.frame_duration_ms,
        );
        // Der Downlink-Decoder laeuft auf der Geraete-Rate; die Frame-Dauer
        // folgt dem Server-Standard damit der PCM-Puffer fuer ganze
        // Server-Frames reicht
        let playback_format = AudioFormat::neu(
            config.audio.sample_rate,
            config.audio.channels,
            STANDARD_SERVER_FRAME_DAUER,
        );
        let capture_codec = OpusCodec::neu(capture_format).map_err(audio_fehler)?;
        let playback_codec = OpusCodec::neu(playback_format).map_err(audio_fehler)?;

        Self::mit_komponenten(
            config,
            geraet,
            Box::new(capture_codec),
            Box::new(playback_codec),
        )
    }

    /// Erstellt den Client mit injizierten Komponenten (Stub-Backends,
    /// Tests, alternative Hosts)
    pub fn mit_komponenten(
        config: ClientConfig,
        geraet: Arc<dyn AudioGeraet>,
        capture_codec: Box<dyn AudioCodec>,
        playback_codec: Box<dyn AudioCodec>,
    ) -> Result<Self> {
        config.validieren().map_err(VoicelinkError::Konfiguration)?;

        let playback_format = playback_codec.format();
        let playback = Arc::new(PlaybackEngine::neu(
            WiedergabeKonfig {
                ring_bytes: config.audio.playback_ring_bytes,
                format: playback_format,
            },
            playback_codec,
            Arc::clone(&geraet),
        ));

        let mcp = McpServer::neu("voicelink", env!("CARGO_PKG_VERSION"))
            .map_err(|e| VoicelinkError::Werkzeug(e.to_string()))?;

        let session_config = SessionConfig {
            url: config.verbindung.server_url.clone(),
            auth_token: config.verbindung.auth_token.clone(),
            device_id: config.verbindung.device_id.clone(),
            client_id: Some(config.client_id_oder_generiert()),
            protocol_version: config.verbindung.protocol_version,
            format: AudioFormat::neu(
                config.audio.sample_rate,
                config.audio.channels,
                config.audio.frame_duration_ms,
            ),
            verbindungs_frist: Duration::from_millis(config.verbindung.timeout_ms),
        };
        let (engine, ereignis_rx) = SessionEngine::neu(session_config).map_err(session_fehler)?;

        let callback: Arc<OnceLock<EreignisCallback>> = Arc::new(OnceLock::new());

        // Zustandswechsel der Wiedergabe in den Ereignis-Strom spiegeln
        let callback_klon = Arc::clone(&callback);
        playback
            .zustands_callback_setzen(Box::new(move |alt, neu| {
                if let Some(senke) = callback_klon.get() {
                    senke(Ereignis::neu(EreignisArt::ZustandGewechselt { alt, neu }));
                }
            }))
            .map_err(audio_fehler)?;

        Ok(Self {
            config,
            geraet,
            playback,
            mcp: Arc::new(Mutex::new(mcp)),
            engine,
            ereignis_rx: Mutex::new(Some(ereignis_rx)),
            callback,
            sende_gate: Arc::new(AtomicBool::new(false)),
            capture_codec: Mutex::new(Some(capture_codec)),
            capture: Mutex::new(None),
            fanout: Mutex::new(None),
            fanout_task: Mutex::new(None),
        })
    }

    /// Registriert den Ereignis-Konsumenten (genau einmal setzbar)
    pub fn ereignis_callback_setzen(&self, callback: EreignisCallback) -> Result<()> {
        self.callback
            .set(callback)
            .map_err(|_| VoicelinkError::UngueltigerZustand("Callback bereits gesetzt".into()))
    }

    /// Zugriff auf den Tool-Server (zum Registrieren von Werkzeugen)
    pub fn mcp(&self) -> Arc<Mutex<McpServer>> {
        Arc::clone(&self.mcp)
    }

    /// Startet Geraet, Wiedergabe, Session, Ereignis-Verteilung und Capture
    pub async fn start(&self) -> Result<()> {
        let capture_format = AudioFormat::neu(
            self.config.audio.sample_rate,
            self.config.audio.channels,
            self.config.audio.frame_duration_ms,
        );

        self.geraet
            .konfigurieren(&GeraetKonfig {
                format: capture_format,
                capture_puffer: self.config.audio.capture_buffer,
                playback_puffer: self.config.audio.playback_buffer,
            })
            .map_err(audio_fehler)?;
        self.geraet.capture_starten().map_err(audio_fehler)?;
        self.geraet.playback_starten().map_err(audio_fehler)?;

        self.engine.start().await.map_err(session_fehler)?;
        let handle = self.engine.handle().map_err(session_fehler)?;

        // Antworten des Tool-Servers wandern in den MCP-Umschlag der Session
        {
            let mcp_handle = handle.clone();
            self.mcp.lock().senke_setzen(Box::new(move |text| {
                if let Err(e) = mcp_handle.mcp_senden(text) {
                    warn!("MCP-Antwort nicht gesendet: {}", e);
                }
            }));
        }

        self.playback.start().map_err(audio_fehler)?;

        // Ereignis-Verteilung
        let callback_klon = Arc::clone(&self.callback);
        let fanout = EreignisFanout::neu(
            self.config.hoeren.modus,
            Arc::new(handle.clone()) as Arc<dyn Steuerkanal>,
            Arc::clone(&self.playback),
            Arc::clone(&self.mcp),
            Arc::new(move |ereignis| {
                if let Some(senke) = callback_klon.get() {
                    senke(ereignis);
                }
            }),
            Arc::clone(&self.sende_gate),
        );
        *self.fanout.lock() = Some(fanout.clone());

        let mut ereignis_rx = self
            .ereignis_rx
            .lock()
            .take()
            .ok_or_else(|| VoicelinkError::UngueltigerZustand("Client bereits gestartet".into()))?;
        let task = tokio::spawn(async move {
            while let Some(ereignis) = ereignis_rx.recv().await {
                fanout.verarbeiten(ereignis);
            }
        });
        *self.fanout_task.lock() = Some(task);

        // Capture-Worker zuletzt; das Gate bleibt zu bis das Hoeren beginnt
        let capture_codec = self
            .capture_codec
            .lock()
            .take()
            .ok_or_else(|| VoicelinkError::UngueltigerZustand("Client bereits gestartet".into()))?;
        let worker = CaptureWorker::starten(
            Arc::clone(&self.geraet),
            capture_codec,
            Arc::new(handle) as Arc<dyn AudioVersand>,
            Arc::clone(&self.sende_gate),
            capture_format,
        )?;
        *self.capture.lock() = Some(worker);

        info!("Voicelink-Client gestartet");
        Ok(())
    }

    /// Stoppt alle Komponenten in der Reihenfolge
    /// Capture → Wiedergabe → Session → Geraet
    pub async fn stop(&self) {
        let capture = self.capture.lock().take();
        if let Some(mut worker) = capture {
            worker.stoppen();
        }

        if let Err(e) = self.playback.stop() {
            warn!("Wiedergabe-Stopp fehlgeschlagen: {}", e);
        }

        self.engine.stop().await;

        if let Err(e) = self.geraet.stoppen() {
            warn!("Geraete-Stopp fehlgeschlagen: {}", e);
        }

        let task = self.fanout_task.lock().take();
        if let Some(task) = task {
            task.abort();
        }

        info!("Voicelink-Client gestoppt");
    }

    // -----------------------------------------------------------------------
    // Steuerung
    // -----------------------------------------------------------------------

    /// Meldet ein erkanntes Wake-Word an den Server
    pub fn wake_word_melden(&self, wort: &str) -> Result<()> {
        self.engine
            .handle()
            .and_then(|h| h.wake_word_melden(wort))
            .map_err(session_fehler)
    }

    /// Fordert den Abbruch der Server-Ausgabe an; die Wiedergabe selbst
    /// laeuft weiter bis der Server `tts stop` sendet
    pub fn abbrechen(&self, grund: Option<AbbruchGrund>) -> Result<()> {
        self.engine
            .handle()
            .and_then(|h| h.abbrechen(grund))
            .map_err(session_fehler)
    }

    /// Startet das Hoeren manuell (z. B. im Manual-Modus)
    pub fn hoeren_starten(&self, modus: HoerModus) -> Result<()> {
        self.engine
            .handle()
            .and_then(|h| SessionHandle::hoeren_starten(&h, modus))
            .map_err(session_fehler)
    }

    /// Stoppt das Hoeren manuell
    pub fn hoeren_stoppen(&self) -> Result<()> {
        self.engine
            .handle()
            .and_then(|h| SessionHandle::hoeren_stoppen(&h))
            .map_err(session_fehler)
    }

    // -----------------------------------------------------------------------
    // Beobachtung
    // -----------------------------------------------------------------------

    pub fn ist_verbunden(&self) -> bool {
        self.engine.ist_verbunden()
    }

    /// Liveness-Pruefung (120-s-Fenster der Session)
    pub fn ist_timeout(&self) -> bool {
        self.engine.ist_timeout()
    }

    pub fn session_id(&self) -> Option<String> {
        self.engine.session_id()
    }

    /// Momentaufnahme des Fassaden-Zustands (None vor `start`)
    pub fn zustand(&self) -> Option<FacadeZustand> {
        self.fanout.lock().as_ref().map(EreignisFanout::zustand)
    }

    /// Zaehler der Wiedergabe: (PCM-Bytes, Frames)
    pub fn wiedergabe_statistik(&self) -> (u64, u64) {
        self.playback.statistik()
    }

    /// Zaehler des Capture-Workers: (gesendet, verworfen)
    pub fn capture_statistik(&self) -> (u64, u64) {
        self.capture
            .lock()
            .as_ref()
            .map(|worker| {
                (
                    worker.statistik().frames_gesendet(),
                    worker.statistik().frames_verworfen(),
                )
            })
            .unwrap_or((0, 0))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

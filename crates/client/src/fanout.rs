//! Ereignis-Verteilung der Fassade
//!
//! Uebersetzt die Ereignisse der Session-Engine in den typisierten
//! Ereignis-Strom fuer den registrierten Konsumenten und fuehrt die
//! automatischen Ablaeufe aus:
//!
//! - Server-Hello: `SessionAufgebaut` melden, Hoeren starten
//! - `tts start`: Hoeren stoppen (Echo-Vermeidung), `TtsGestartet`
//! - `tts stop`: Hoeren wieder starten und `TtsGestoppt` erst melden
//!   wenn der Wiedergabe-Puffer leer ist (das einzige
//!   Backpressure-Kriterium)
//! - `goodbye`: Session-Zustand leeren, `SessionBeendet`
//!
//! Jede MCP-Nachricht des Servers wird zusaetzlich an den eingebetteten
//! Tool-Server geleitet, damit das Dialog-Modell Werkzeuge ohne eigenen
//! Kanal aufrufen kann.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use voicelink_audio::playback::PlaybackEngine;
use voicelink_core::event::{Ereignis, EreignisArt, FehlerQuelle, TextRolle};
use voicelink_core::types::{Ablaufzustand, HoerModus};
use voicelink_core::Result;
use voicelink_mcp::McpServer;
use voicelink_protocol::control::{ServerNachricht, TtsPhase};
use voicelink_session::SessionEreignis;

/// Abstand der Leerlauf-Pruefungen beim verzoegerten `TtsGestoppt`
const ENTLEERUNGS_INTERVALL: Duration = Duration::from_millis(10);

/// Senke fuer den Ereignis-Strom (genau ein Konsument)
pub type EreignisSenke = Arc<dyn Fn(Ereignis) + Send + Sync>;

/// Seam fuer die ausgehende Steuerung (implementiert vom Session-Handle)
pub trait Steuerkanal: Send + Sync {
    fn hoeren_starten(&self, modus: HoerModus) -> Result<()>;
    fn hoeren_stoppen(&self) -> Result<()>;
    fn mcp_senden(&self, payload: &str) -> Result<()>;
}

/// Session-Zustand der Fassade (unter der Zustands-Mutex)
#[derive(Debug, Default, Clone)]
pub struct FacadeZustand {
    pub session_id: Option<String>,
    pub hoer_zustand: Ablaufzustand,
    pub tts_zustand: Ablaufzustand,
}

// ---------------------------------------------------------------------------
// EreignisFanout
// ---------------------------------------------------------------------------

/// Verteilt Session-Ereignisse und fuehrt die Automatik-Ablaeufe aus
#[derive(Clone)]
pub struct EreignisFanout {
    zustand: Arc<Mutex<FacadeZustand>>,
    modus: HoerModus,
    steuerkanal: Arc<dyn Steuerkanal>,
    playback: Arc<PlaybackEngine>,
    mcp: Arc<Mutex<McpServer>>,
    senke: EreignisSenke,
    /// Gate fuer den Capture-Worker: nur bei aktivem Hoeren senden
    sende_gate: Arc<AtomicBool>,
}

impl EreignisFanout {
    pub fn neu(
        modus: HoerModus,
        steuerkanal: Arc<dyn Steuerkanal>,
        playback: Arc<PlaybackEngine>,
        mcp: Arc<Mutex<McpServer>>,
        senke: EreignisSenke,
        sende_gate: Arc<AtomicBool>,
    ) -> Self {
        Self {
            zustand: Arc::new(Mutex::new(FacadeZustand::default())),
            modus,
            steuerkanal,
            playback,
            mcp,
            senke,
            sende_gate,
        }
    }

    /// Momentaufnahme des Fassaden-Zustands
    pub fn zustand(&self) -> FacadeZustand {
        self.zustand.lock().clone()
    }

    fn melden(&self, art: EreignisArt) {
        (self.senke)(Ereignis::neu(art));
    }

    /// Verarbeitet ein Ereignis der Session-Engine
    ///
    /// Muss innerhalb einer tokio-Runtime laufen (das verzoegerte
    /// `TtsGestoppt` wird als Task abgewartet).
    pub fn verarbeiten(&self, ereignis: SessionEreignis) {
        match ereignis {
            SessionEreignis::Verbunden => {
                self.melden(EreignisArt::VerbindungHergestellt);
            }
            SessionEreignis::Getrennt { grund } => {
                debug!(grund = %grund, "Verbindung getrennt");
                self.sende_gate.store(false, Ordering::SeqCst);
                {
                    let mut zustand = self.zustand.lock();
                    zustand.session_id = None;
                    zustand.hoer_zustand = Ablaufzustand::Leerlauf;
                    zustand.tts_zustand = Ablaufzustand::Leerlauf;
                }
                self.melden(EreignisArt::VerbindungGetrennt);
            }
            SessionEreignis::HelloEmpfangen { session_id } => {
                self.hello_verarbeiten(session_id);
            }
            SessionEreignis::Json(wert) => {
                self.json_verarbeiten(&wert);
            }
            SessionEreignis::Audio(frame) => {
                if let Err(e) = self.playback.daten_einspeisen(&frame.payload) {
                    warn!("Audio-Frame nicht eingespeist: {}", e);
                }
                self.melden(EreignisArt::AudioEmpfangen(frame));
            }
            SessionEreignis::NetzwerkFehler { nachricht } => {
                self.melden(EreignisArt::Fehler {
                    quelle: FehlerQuelle::Transport,
                    nachricht,
                });
            }
        }
    }

    fn hello_verarbeiten(&self, session_id: Option<String>) {
        let id = session_id.unwrap_or_default();
        self.zustand.lock().session_id = Some(id.clone());
        self.melden(EreignisArt::SessionAufgebaut { session_id: id });

        // Nach dem Handshake sofort mit dem konfigurierten Modus hoeren
        if let Err(e) = self.steuerkanal.hoeren_starten(self.modus) {
            warn!("Hoeren konnte nicht gestartet werden: {}", e);
            return;
        }
        self.zustand.lock().hoer_zustand = Ablaufzustand::Gestartet;
        self.sende_gate.store(true, Ordering::SeqCst);
        self.melden(EreignisArt::HoerenGestartet);
    }

    fn json_verarbeiten(&self, wert: &serde_json::Value) {
        match ServerNachricht::aus_wert(wert) {
            Some(ServerNachricht::Tts(tts)) => match tts.state {
                TtsPhase::Start => self.tts_start_verarbeiten(),
                TtsPhase::Stop => self.tts_stop_verarbeiten(),
                TtsPhase::SentenceStart => {
                    if let Some(text) = tts.text {
                        self.melden(EreignisArt::TextNachricht {
                            text,
                            rolle: TextRolle::Assistent,
                        });
                    }
                }
                TtsPhase::SentenceEnd | TtsPhase::Unbekannt => {}
            },
            Some(ServerNachricht::Stt(stt)) => {
                self.melden(EreignisArt::TextNachricht {
                    text: stt.text,
                    rolle: TextRolle::Benutzer,
                });
            }
            Some(ServerNachricht::Llm(llm)) => {
                if let Some(emotion) = llm.emotion {
                    self.melden(EreignisArt::EmotionNachricht { emotion });
                }
            }
            Some(ServerNachricht::Mcp(mcp)) => {
                let payload = mcp.payload.to_string();
                self.mcp.lock().nachricht_verarbeiten(&payload);
                self.melden(EreignisArt::McpNachricht { payload });
            }
            Some(ServerNachricht::Goodbye { .. }) => {
                self.sende_gate.store(false, Ordering::SeqCst);
                {
                    let mut zustand = self.zustand.lock();
                    zustand.session_id = None;
                    zustand.hoer_zustand = Ablaufzustand::Leerlauf;
                    zustand.tts_zustand = Ablaufzustand::Leerlauf;
                }
                self.melden(EreignisArt::SessionBeendet);
            }
            // Hello kommt bereits als eigenes Engine-Ereignis; Unbekanntes
            // ist fuer hoehere Schichten nicht relevant
            Some(ServerNachricht::Hello(_)) | None => {}
        }
    }

    fn tts_start_verarbeiten(&self) {
        // Hoeren stoppen damit die eigene Ausgabe nicht aufgenommen wird
        if let Err(e) = self.steuerkanal.hoeren_stoppen() {
            warn!("Hoeren konnte nicht gestoppt werden: {}", e);
        }
        self.sende_gate.store(false, Ordering::SeqCst);
        {
            let mut zustand = self.zustand.lock();
            zustand.hoer_zustand = Ablaufzustand::Gestoppt;
            zustand.tts_zustand = Ablaufzustand::Gestartet;
        }
        self.melden(EreignisArt::TtsGestartet);
    }

    fn tts_stop_verarbeiten(&self) {
        self.zustand.lock().tts_zustand = Ablaufzustand::Gestoppt;

        // `TtsGestoppt` erst melden wenn der Wiedergabe-Puffer leer ist;
        // der Zeitstempel entsteht beim Melden und liegt damit nach dem
        // Empfang der Stop-Nachricht
        let fanout = self.clone();
        tokio::spawn(async move {
            while !fanout.playback.puffer_leer() {
                tokio::time::sleep(ENTLEERUNGS_INTERVALL).await;
            }
            // Inzwischen neu gestartetes TTS bricht den Abschluss ab
            if fanout.zustand.lock().tts_zustand != Ablaufzustand::Gestoppt {
                return;
            }
            if let Err(e) = fanout.steuerkanal.hoeren_starten(fanout.modus) {
                warn!("Hoeren konnte nicht wieder gestartet werden: {}", e);
            } else {
                fanout.zustand.lock().hoer_zustand = Ablaufzustand::Gestartet;
                fanout.sende_gate.store(true, Ordering::SeqCst);
            }
            fanout.melden(EreignisArt::TtsGestoppt);
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Instant;
    use voicelink_audio::codec::StubCodec;
    use voicelink_audio::device::{AudioGeraet, GeraetKonfig};
    use voicelink_audio::playback::WiedergabeKonfig;
    use voicelink_audio::stub_backend::StubGeraet;
    use voicelink_core::types::AudioFormat;
    use voicelink_core::VoicelinkError;

    /// Steuerkanal der alle Aufrufe aufzeichnet
    #[derive(Default)]
    struct TestKanal {
        aufrufe: Mutex<Vec<String>>,
        fehlschlagen: AtomicBool,
    }

    impl Steuerkanal for TestKanal {
        fn hoeren_starten(&self, modus: HoerModus) -> Result<()> {
            if self.fehlschlagen.load(Ordering::Relaxed) {
                return Err(VoicelinkError::NichtVerbunden);
            }
            self.aufrufe
                .lock()
                .push(format!("hoeren_starten:{}", modus.als_wire()));
            Ok(())
        }

        fn hoeren_stoppen(&self) -> Result<()> {
            self.aufrufe.lock().push("hoeren_stoppen".into());
            Ok(())
        }

        fn mcp_senden(&self, payload: &str) -> Result<()> {
            self.aufrufe.lock().push(format!("mcp:{}", payload));
            Ok(())
        }
    }

    struct TestAufbau {
        fanout: EreignisFanout,
        kanal: Arc<TestKanal>,
        playback: Arc<PlaybackEngine>,
        ereignisse: Arc<Mutex<Vec<Ereignis>>>,
        gate: Arc<AtomicBool>,
        mcp_antworten: Arc<Mutex<Vec<String>>>,
    }

    fn aufbau() -> TestAufbau {
        let format = AudioFormat::default();
        let geraet = Arc::new(StubGeraet::neu());
        geraet
            .konfigurieren(&GeraetKonfig {
                format,
                capture_puffer: 16000,
                playback_puffer: 16000,
            })
            .unwrap();
        let playback = Arc::new(PlaybackEngine::neu(
            WiedergabeKonfig {
                ring_bytes: 4096,
                format,
            },
            Box::new(StubCodec::neu(format)),
            geraet as Arc<dyn AudioGeraet>,
        ));

        let mut mcp = McpServer::neu("voicelink", "1.0.0").unwrap();
        let mcp_antworten = Arc::new(Mutex::new(Vec::new()));
        let antworten_klon = Arc::clone(&mcp_antworten);
        mcp.senke_setzen(Box::new(move |text| {
            antworten_klon.lock().push(text.to_string());
        }));

        let kanal = Arc::new(TestKanal::default());
        let ereignisse = Arc::new(Mutex::new(Vec::new()));
        let ereignisse_klon = Arc::clone(&ereignisse);
        let gate = Arc::new(AtomicBool::new(false));

        let fanout = EreignisFanout::neu(
            HoerModus::Auto,
            Arc::clone(&kanal) as Arc<dyn Steuerkanal>,
            Arc::clone(&playback),
            Arc::new(Mutex::new(mcp)),
            Arc::new(move |e| ereignisse_klon.lock().push(e)),
            Arc::clone(&gate),
        );

        TestAufbau {
            fanout,
            kanal,
            playback,
            ereignisse,
            gate,
            mcp_antworten,
        }
    }

    fn arten(ereignisse: &Arc<Mutex<Vec<Ereignis>>>) -> Vec<String> {
        ereignisse
            .lock()
            .iter()
            .map(|e| match &e.art {
                EreignisArt::VerbindungHergestellt => "verbunden".into(),
                EreignisArt::VerbindungGetrennt => "getrennt".into(),
                EreignisArt::SessionAufgebaut { session_id } => {
                    format!("session:{}", session_id)
                }
                EreignisArt::SessionBeendet => "session_ende".into(),
                EreignisArt::HoerenGestartet => "hoeren_start".into(),
                EreignisArt::HoerenGestoppt => "hoeren_stop".into(),
                EreignisArt::TtsGestartet => "tts_start".into(),
                EreignisArt::TtsGestoppt => "tts_stop".into(),
                EreignisArt::AudioEmpfangen(_) => "audio".into(),
                EreignisArt::TextNachricht { rolle, .. } => format!("text:{:?}", rolle),
                EreignisArt::McpNachricht { .. } => "mcp".into(),
                EreignisArt::EmotionNachricht { emotion } => format!("emotion:{}", emotion),
                EreignisArt::ZustandGewechselt { .. } => "zustand".into(),
                EreignisArt::Fehler { .. } => "fehler".into(),
            })
            .collect()
    }

    fn json(text: &str) -> SessionEreignis {
        SessionEreignis::Json(serde_json::from_str(text).unwrap())
    }

    /// Pollt asynchron bis die Bedingung gilt
    async fn warte_bis(frist: Duration, bedingung: impl Fn() -> bool) -> bool {
        let ende = Instant::now() + frist;
        while Instant::now() < ende {
            if bedingung() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        bedingung()
    }

    #[test]
    fn handshake_startet_hoeren() {
        let aufbau = aufbau();
        aufbau.fanout.verarbeiten(SessionEreignis::HelloEmpfangen {
            session_id: Some("abc".into()),
        });

        // Erst die Session melden, dann Hoeren starten
        assert_eq!(arten(&aufbau.ereignisse), vec!["session:abc", "hoeren_start"]);
        assert_eq!(
            aufbau.kanal.aufrufe.lock().clone(),
            vec!["hoeren_starten:auto"]
        );
        let zustand = aufbau.fanout.zustand();
        assert_eq!(zustand.session_id.as_deref(), Some("abc"));
        assert_eq!(zustand.hoer_zustand, Ablaufzustand::Gestartet);
        assert!(aufbau.gate.load(Ordering::SeqCst));
    }

    #[test]
    fn tts_start_stoppt_hoeren() {
        let aufbau = aufbau();
        aufbau.gate.store(true, Ordering::SeqCst);
        aufbau.fanout.verarbeiten(json(r#"{"type":"tts","state":"start"}"#));

        assert_eq!(arten(&aufbau.ereignisse), vec!["tts_start"]);
        assert_eq!(aufbau.kanal.aufrufe.lock().clone(), vec!["hoeren_stoppen"]);
        assert!(!aufbau.gate.load(Ordering::SeqCst));
        let zustand = aufbau.fanout.zustand();
        assert_eq!(zustand.tts_zustand, Ablaufzustand::Gestartet);
        assert_eq!(zustand.hoer_zustand, Ablaufzustand::Gestoppt);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tts_stop_wartet_auf_leeren_puffer() {
        let aufbau = aufbau();
        // 512 Bytes liegen noch im Wiedergabe-Puffer (Engine im Leerlauf,
        // der Worker konsumiert nichts)
        aufbau.playback.daten_einspeisen(&vec![1u8; 512]).unwrap();

        let empfangszeit = Utc::now();
        aufbau.fanout.verarbeiten(json(r#"{"type":"tts","state":"stop"}"#));

        // Solange der Puffer nicht leer ist darf kein TtsGestoppt kommen
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!arten(&aufbau.ereignisse).contains(&"tts_stop".to_string()));

        aufbau.playback.puffer_leeren();
        let ereignisse = Arc::clone(&aufbau.ereignisse);
        assert!(
            warte_bis(Duration::from_secs(2), move || {
                ereignisse
                    .lock()
                    .iter()
                    .any(|e| matches!(e.art, EreignisArt::TtsGestoppt))
            })
            .await,
            "TtsGestoppt muss nach dem Entleeren kommen"
        );

        // Der verzoegerte Zeitstempel liegt nach dem Empfang der Stop-Nachricht
        let liste = aufbau.ereignisse.lock();
        let tts_stop = liste
            .iter()
            .find(|e| matches!(e.art, EreignisArt::TtsGestoppt))
            .unwrap();
        assert!(tts_stop.zeitpunkt >= empfangszeit);

        // Danach wird wieder gehoert
        assert!(aufbau
            .kanal
            .aufrufe
            .lock()
            .contains(&"hoeren_starten:auto".to_string()));
        assert!(aufbau.gate.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn tts_stop_mit_leerem_puffer_meldet_sofort() {
        let aufbau = aufbau();
        aufbau.fanout.verarbeiten(json(r#"{"type":"tts","state":"stop"}"#));
        let ereignisse = Arc::clone(&aufbau.ereignisse);
        assert!(
            warte_bis(Duration::from_secs(1), move || {
                ereignisse
                    .lock()
                    .iter()
                    .any(|e| matches!(e.art, EreignisArt::TtsGestoppt))
            })
            .await
        );
    }

    #[test]
    fn goodbye_beendet_session() {
        let aufbau = aufbau();
        aufbau.fanout.verarbeiten(SessionEreignis::HelloEmpfangen {
            session_id: Some("abc".into()),
        });
        aufbau.fanout.verarbeiten(json(r#"{"type":"goodbye"}"#));

        let zustand = aufbau.fanout.zustand();
        assert_eq!(zustand.session_id, None);
        assert_eq!(zustand.hoer_zustand, Ablaufzustand::Leerlauf);
        assert!(!aufbau.gate.load(Ordering::SeqCst));
        assert!(arten(&aufbau.ereignisse).contains(&"session_ende".to_string()));
    }

    #[test]
    fn stt_und_llm_nachrichten() {
        let aufbau = aufbau();
        aufbau
            .fanout
            .verarbeiten(json(r#"{"type":"stt","text":"Hallo"}"#));
        aufbau
            .fanout
            .verarbeiten(json(r#"{"type":"llm","emotion":"happy"}"#));
        aufbau.fanout.verarbeiten(json(
            r#"{"type":"tts","state":"sentence_start","text":"Guten Tag"}"#,
        ));

        assert_eq!(
            arten(&aufbau.ereignisse),
            vec!["text:Benutzer", "emotion:happy", "text:Assistent"]
        );
    }

    #[test]
    fn mcp_nachricht_erreicht_tool_server() {
        let aufbau = aufbau();
        aufbau.fanout.verarbeiten(json(
            r#"{"type":"mcp","payload":{"jsonrpc":"2.0","id":1,"method":"tools/list"}}"#,
        ));

        // Der Tool-Server hat geantwortet und das Ereignis wurde gemeldet
        assert_eq!(aufbau.mcp_antworten.lock().len(), 1);
        assert!(arten(&aufbau.ereignisse).contains(&"mcp".to_string()));
    }

    #[test]
    fn audio_wird_eingespeist_und_gemeldet() {
        let aufbau = aufbau();
        let frame = voicelink_core::types::AudioFrame::neu(24000, 60, 0, vec![9u8; 100]);
        aufbau.fanout.verarbeiten(SessionEreignis::Audio(frame));

        assert!(!aufbau.playback.puffer_leer());
        assert_eq!(arten(&aufbau.ereignisse), vec!["audio"]);
    }

    #[test]
    fn netzwerkfehler_wird_gemeldet() {
        let aufbau = aufbau();
        aufbau.fanout.verarbeiten(SessionEreignis::NetzwerkFehler {
            nachricht: "Socket zu".into(),
        });
        assert_eq!(arten(&aufbau.ereignisse), vec!["fehler"]);
    }

    #[test]
    fn getrennt_setzt_zustand_zurueck() {
        let aufbau = aufbau();
        aufbau.fanout.verarbeiten(SessionEreignis::HelloEmpfangen {
            session_id: Some("abc".into()),
        });
        aufbau.fanout.verarbeiten(SessionEreignis::Getrennt {
            grund: "Test".into(),
        });

        let zustand = aufbau.fanout.zustand();
        assert_eq!(zustand.session_id, None);
        assert!(!aufbau.gate.load(Ordering::SeqCst));
        assert!(arten(&aufbau.ereignisse).contains(&"getrennt".to_string()));
    }
}

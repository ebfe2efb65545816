//! Capture-Worker
//!
//! Eigener OS-Thread (kein tokio-Task, um Echtzeit-Audio nicht mit den
//! Netzwerk-Tasks konkurrieren zu lassen): liest blockierend PCM vom
//! Geraet, kodiert jeden Frame und reicht ihn an die Session weiter.
//! Codec-Fehler verwerfen den betroffenen Frame, der Strom laeuft weiter.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use tracing::{debug, trace, warn};

use voicelink_audio::codec::AudioCodec;
use voicelink_audio::device::AudioGeraet;
use voicelink_audio::error::AudioError;
use voicelink_core::types::{AudioFormat, AudioFrame};
use voicelink_core::{Result, VoicelinkError};

/// Wartezeit wenn das Sende-Gate geschlossen ist
const GATE_PAUSE: Duration = Duration::from_millis(20);

/// Seam fuer den Audio-Versand (implementiert vom Session-Handle)
pub trait AudioVersand: Send + Sync {
    /// Sendet einen kodierten Frame; Fehler bedeuten "Frame verworfen"
    fn audio_senden(&self, frame: AudioFrame) -> Result<()>;
}

/// Kommandos an den Capture-Thread
enum CaptureBefehl {
    Beenden,
}

/// Zaehler des Capture-Workers
#[derive(Default)]
pub struct CaptureStatistik {
    frames_gesendet: AtomicU64,
    frames_verworfen: AtomicU64,
}

impl CaptureStatistik {
    pub fn frames_gesendet(&self) -> u64 {
        self.frames_gesendet.load(Ordering::Relaxed)
    }

    pub fn frames_verworfen(&self) -> u64 {
        self.frames_verworfen.load(Ordering::Relaxed)
    }
}

/// Capture-Thread-Steuerung
pub struct CaptureWorker {
    befehle: Sender<CaptureBefehl>,
    handle: Option<std::thread::JoinHandle<()>>,
    statistik: Arc<CaptureStatistik>,
}

impl CaptureWorker {
    /// Startet den Capture-Thread
    ///
    /// `gate` steuert ob Frames kodiert und gesendet werden; bei
    /// geschlossenem Gate schlaeft der Thread kurz und prueft erneut.
    pub fn starten(
        geraet: Arc<dyn AudioGeraet>,
        codec: Box<dyn AudioCodec>,
        versand: Arc<dyn AudioVersand>,
        gate: Arc<AtomicBool>,
        format: AudioFormat,
    ) -> Result<Self> {
        let (befehl_tx, befehl_rx) = bounded::<CaptureBefehl>(4);
        let statistik = Arc::new(CaptureStatistik::default());
        let statistik_klon = Arc::clone(&statistik);

        let handle = std::thread::Builder::new()
            .name("voicelink-capture".to_string())
            .spawn(move || {
                capture_schleife(befehl_rx, geraet, codec, versand, gate, format, statistik_klon);
            })
            .map_err(|e| VoicelinkError::Audio(e.to_string()))?;

        Ok(Self {
            befehle: befehl_tx,
            handle: Some(handle),
            statistik,
        })
    }

    /// Zaehler des Workers
    pub fn statistik(&self) -> &CaptureStatistik {
        &self.statistik
    }

    /// Beendet den Thread und wartet auf ihn
    pub fn stoppen(&mut self) {
        let _ = self.befehle.send(CaptureBefehl::Beenden);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.stoppen();
    }
}

// ---------------------------------------------------------------------------
// Thread-Schleife
// ---------------------------------------------------------------------------

fn capture_schleife(
    befehl_rx: Receiver<CaptureBefehl>,
    geraet: Arc<dyn AudioGeraet>,
    mut codec: Box<dyn AudioCodec>,
    versand: Arc<dyn AudioVersand>,
    gate: Arc<AtomicBool>,
    format: AudioFormat,
    statistik: Arc<CaptureStatistik>,
) {
    let mut pcm = vec![0i16; format.samples_pro_frame_gesamt()];
    let mut paket = vec![0u8; codec.max_output_groesse()];
    let start_zeit = Instant::now();

    debug!("Capture-Thread gestartet");

    loop {
        match befehl_rx.try_recv() {
            Ok(CaptureBefehl::Beenden) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        if !gate.load(Ordering::Relaxed) {
            std::thread::sleep(GATE_PAUSE);
            continue;
        }

        match geraet.lesen(&mut pcm) {
            Ok(()) => {
                let timestamp_ms = start_zeit.elapsed().as_millis() as u32;
                match codec.encode(&pcm, &mut paket) {
                    Ok(bytes) => {
                        let frame = AudioFrame::neu(
                            format.sample_rate,
                            format.frame_duration_ms,
                            timestamp_ms,
                            paket[..bytes].to_vec(),
                        );
                        match versand.audio_senden(frame) {
                            Ok(()) => {
                                statistik.frames_gesendet.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => {
                                statistik.frames_verworfen.fetch_add(1, Ordering::Relaxed);
                                trace!("Frame nicht gesendet: {}", e);
                            }
                        }
                    }
                    Err(e) => {
                        statistik.frames_verworfen.fetch_add(1, Ordering::Relaxed);
                        warn!("Encoding fehlgeschlagen, Frame verworfen: {}", e);
                    }
                }
            }
            // Kein Audio innerhalb der Lesefrist: einfach weiter
            Err(AudioError::Zeitlimit) => continue,
            Err(e) => {
                warn!("Geraete-Lesefehler: {}", e);
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }

    debug!("Capture-Thread beendet");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

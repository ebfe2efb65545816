//! Wiedergabe-Pipeline
//!
//! Nimmt den variabel getakteten Audio-Strom des Servers in einen
//! Byte-Ring-Buffer auf, dekodiert ihn in einem eigenen Worker-Thread
//! und schreibt das PCM in das Ausgabegeraet. Der Zustand ist von aussen
//! beobachtbar; jeder Uebergang loest genau einen Zustands-Callback aus.
//!
//! ## Zustandsmaschine
//!
//! ```text
//! Leerlauf ──start──▶ Spielt ──pause──▶ Pausiert ──resume──▶ Spielt ──stop──▶ Gestoppt
//!                        │                  │                                    ▲
//!                        └────────── stop ──┴───────────── stop ────────────────┘
//! beliebiger Zustand ── fatal ──▶ Fehler
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, info, warn};

use voicelink_core::types::{AudioFormat, WiedergabeZustand};

use crate::codec::AudioCodec;
use crate::device::AudioGeraet;
use crate::error::{AudioError, AudioResult};
use crate::ring_buffer::RingBuffer;

/// Standard-Kapazitaet des Byte-Ring-Buffers (64 KiB)
pub const STANDARD_RING_BYTES: usize = 64 * 1024;

/// Kurze Pause des Workers pro Schleifendurchlauf
const WORKER_PAUSE: Duration = Duration::from_millis(10);

/// Wartezeit auf der Condition Variable (begrenzt, damit Zustandswechsel
/// und Shutdown zeitnah bemerkt werden)
const CV_WARTEZEIT: Duration = Duration::from_millis(100);

/// Callback fuer Zustandswechsel; laeuft synchron auf dem ausloesenden
/// Thread und darf nicht blockieren
pub type ZustandsCallback = Box<dyn Fn(WiedergabeZustand, WiedergabeZustand) + Send + Sync>;

/// Konfiguration der Wiedergabe-Pipeline
#[derive(Debug, Clone)]
pub struct WiedergabeKonfig {
    /// Kapazitaet des Byte-Ring-Buffers
    pub ring_bytes: usize,
    /// Format des Downlink-Streams (bestimmt die Dekodier-Puffer)
    pub format: AudioFormat,
}

impl Default for WiedergabeKonfig {
    fn default() -> Self {
        Self {
            ring_bytes: STANDARD_RING_BYTES,
            format: AudioFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackEngine
// ---------------------------------------------------------------------------

struct EngineInner {
    puffer: Mutex<RingBuffer<u8>>,
    puffer_cv: Condvar,
    zustand: Mutex<WiedergabeZustand>,
    /// Serialisiert Zustandswechsel samt Callback-Aufruf
    uebergang: Mutex<()>,
    callback: RwLock<Option<ZustandsCallback>>,
    bytes_gespielt: AtomicU64,
    frames_gespielt: AtomicU64,
    beenden: AtomicBool,
    codec: Mutex<Box<dyn AudioCodec>>,
    geraet: Arc<dyn AudioGeraet>,
    /// Maximale Chunk-Groesse pro Dekodier-Schritt (ein Opus-Paket)
    chunk_groesse: usize,
    /// PCM-Puffer-Groesse (Samples ueber alle Kanaele)
    pcm_groesse: usize,
    kanaele: usize,
}

/// Ring-gepufferte Dekodier- und Ausgabe-Engine
pub struct PlaybackEngine {
    inner: Arc<EngineInner>,
    worker: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl PlaybackEngine {
    /// Erstellt die Engine im Zustand `Leerlauf`
    pub fn neu(
        konfig: WiedergabeKonfig,
        codec: Box<dyn AudioCodec>,
        geraet: Arc<dyn AudioGeraet>,
    ) -> Self {
        let chunk_groesse = codec.max_output_groesse();
        let pcm_groesse = codec.input_frame_groesse() * konfig.format.channels as usize;
        let inner = Arc::new(EngineInner {
            puffer: Mutex::new(RingBuffer::neu(konfig.ring_bytes)),
            puffer_cv: Condvar::new(),
            zustand: Mutex::new(WiedergabeZustand::Leerlauf),
            uebergang: Mutex::new(()),
            callback: RwLock::new(None),
            bytes_gespielt: AtomicU64::new(0),
            frames_gespielt: AtomicU64::new(0),
            beenden: AtomicBool::new(false),
            codec: Mutex::new(codec),
            geraet,
            chunk_groesse,
            pcm_groesse,
            kanaele: konfig.format.channels as usize,
        });
        Self {
            inner,
            worker: Mutex::new(None),
        }
    }

    /// Registriert den Zustands-Callback (genau einmal setzbar)
    pub fn zustands_callback_setzen(&self, callback: ZustandsCallback) -> AudioResult<()> {
        let mut slot = self.inner.callback.write();
        if slot.is_some() {
            return Err(AudioError::UngueltigerZustand(
                "Zustands-Callback bereits gesetzt".into(),
            ));
        }
        *slot = Some(callback);
        Ok(())
    }

    /// Startet den Worker-Thread und wechselt nach `Spielt`
    pub fn start(&self) -> AudioResult<()> {
        {
            let zustand = *self.inner.zustand.lock();
            if !matches!(
                zustand,
                WiedergabeZustand::Leerlauf | WiedergabeZustand::Gestoppt
            ) {
                return Err(AudioError::UngueltigerZustand(format!(
                    "start nicht erlaubt im Zustand {:?}",
                    zustand
                )));
            }
        }

        self.inner.beenden.store(false, Ordering::SeqCst);
        zustand_setzen(&self.inner, WiedergabeZustand::Spielt);

        let inner = Arc::clone(&self.inner);
        let handle = std::thread::Builder::new()
            .name("voicelink-wiedergabe".to_string())
            .spawn(move || worker_schleife(inner))
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;
        *self.worker.lock() = Some(handle);

        info!("Wiedergabe gestartet");
        Ok(())
    }

    /// Pausiert die Wiedergabe (Puffer bleibt erhalten)
    pub fn pausieren(&self) -> AudioResult<()> {
        let zustand = *self.inner.zustand.lock();
        if zustand != WiedergabeZustand::Spielt {
            return Err(AudioError::UngueltigerZustand(format!(
                "pause nicht erlaubt im Zustand {:?}",
                zustand
            )));
        }
        zustand_setzen(&self.inner, WiedergabeZustand::Pausiert);
        Ok(())
    }

    /// Setzt eine pausierte Wiedergabe fort
    pub fn fortsetzen(&self) -> AudioResult<()> {
        let zustand = *self.inner.zustand.lock();
        if zustand != WiedergabeZustand::Pausiert {
            return Err(AudioError::UngueltigerZustand(format!(
                "resume nicht erlaubt im Zustand {:?}",
                zustand
            )));
        }
        zustand_setzen(&self.inner, WiedergabeZustand::Spielt);
        Ok(())
    }

    /// Stoppt die Wiedergabe und joint den Worker-Thread
    pub fn stop(&self) -> AudioResult<()> {
        zustand_setzen(&self.inner, WiedergabeZustand::Gestoppt);
        self.inner.beenden.store(true, Ordering::SeqCst);
        self.inner.puffer_cv.notify_all();

        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
        info!("Wiedergabe gestoppt");
        Ok(())
    }

    /// Nimmt einen Block kodierter Daten in den Ring-Buffer auf
    ///
    /// # Fehler
    /// `PufferVoll` wenn der Block nicht vollstaendig passt (keine
    /// Teil-Schreibvorgaenge) oder die Engine im Zustand `Fehler` ist.
    pub fn daten_einspeisen(&self, daten: &[u8]) -> AudioResult<()> {
        if *self.inner.zustand.lock() == WiedergabeZustand::Fehler {
            return Err(AudioError::PufferVoll);
        }
        {
            let mut puffer = self.inner.puffer.lock();
            if puffer.frei() < daten.len() {
                return Err(AudioError::PufferVoll);
            }
            puffer.schreiben(daten);
        }
        self.inner.puffer_cv.notify_all();
        Ok(())
    }

    /// Leert den Ring-Buffer atomar
    pub fn puffer_leeren(&self) {
        self.inner.puffer.lock().leeren();
        self.inner.puffer_cv.notify_all();
    }

    /// Prueft ob der Ring-Buffer leer ist
    pub fn puffer_leer(&self) -> bool {
        self.inner.puffer.lock().ist_leer()
    }

    /// Prueft ob der Ring-Buffer voll ist
    pub fn puffer_voll(&self) -> bool {
        self.inner.puffer.lock().ist_voll()
    }

    /// Fuellstand des Ring-Buffers (0.0–1.0)
    pub fn puffer_auslastung(&self) -> f32 {
        let puffer = self.inner.puffer.lock();
        puffer.belegt() as f32 / puffer.kapazitaet() as f32
    }

    /// Aktueller Zustand
    pub fn zustand(&self) -> WiedergabeZustand {
        *self.inner.zustand.lock()
    }

    /// Zaehler: (abgespielte PCM-Bytes, dekodierte Frames)
    pub fn statistik(&self) -> (u64, u64) {
        (
            self.inner.bytes_gespielt.load(Ordering::Relaxed),
            self.inner.frames_gespielt.load(Ordering::Relaxed),
        )
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        let _ = self.stop();
        debug!("Wiedergabe-Engine freigegeben");
    }
}

// ---------------------------------------------------------------------------
// Zustandswechsel
// ---------------------------------------------------------------------------

/// Fuehrt einen Zustandswechsel aus und ruft den Callback synchron auf.
/// Uebergaenge sind durch die `uebergang`-Mutex serialisiert; dadurch wird
/// jeder Wechsel gemeldet bevor der naechste beginnt.
fn zustand_setzen(inner: &EngineInner, neu: WiedergabeZustand) {
    let _uebergang = inner.uebergang.lock();
    let alt = {
        let mut zustand = inner.zustand.lock();
        let alt = *zustand;
        if alt == neu {
            return;
        }
        *zustand = neu;
        alt
    };
    inner.puffer_cv.notify_all();
    if let Some(callback) = inner.callback.read().as_ref() {
        callback(alt, neu);
    }
    debug!(?alt, ?neu, "Wiedergabe-Zustand gewechselt");
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

fn worker_schleife(inner: Arc<EngineInner>) {
    let mut chunk = vec![0u8; inner.chunk_groesse];
    let mut pcm = vec![0i16; inner.pcm_groesse];

    debug!("Wiedergabe-Worker gestartet");

    loop {
        if inner.beenden.load(Ordering::SeqCst) {
            break;
        }

        let zustand = *inner.zustand.lock();
        match zustand {
            WiedergabeZustand::Pausiert => {
                // Auf resume/stop warten; die begrenzte Wartezeit deckt
                // verpasste Signale ab
                let mut puffer = inner.puffer.lock();
                inner.puffer_cv.wait_for(&mut puffer, CV_WARTEZEIT);
                continue;
            }
            WiedergabeZustand::Spielt => {}
            WiedergabeZustand::Gestoppt | WiedergabeZustand::Fehler => break,
            WiedergabeZustand::Leerlauf => {
                std::thread::sleep(WORKER_PAUSE);
                continue;
            }
        }

        // Auf Daten warten solange weiter gespielt wird
        let gelesen = {
            let mut puffer = inner.puffer.lock();
            loop {
                if inner.beenden.load(Ordering::SeqCst) {
                    return;
                }
                if !puffer.ist_leer() {
                    break;
                }
                if *inner.zustand.lock() != WiedergabeZustand::Spielt {
                    break;
                }
                inner.puffer_cv.wait_for(&mut puffer, CV_WARTEZEIT);
            }
            if puffer.ist_leer() {
                continue;
            }
            // Ein zusammenhaengender Chunk; die Einspeiser liefern ganze
            // Opus-Frames, der Worker behandelt jeden Chunk als einen Frame
            puffer.lesen(&mut chunk)
        };

        let samples = match inner.codec.lock().decode(&chunk[..gelesen], &mut pcm) {
            Ok(n) => n,
            Err(e) => {
                // Defekten Frame verwerfen, Strom laeuft weiter
                warn!("Dekodier-Fehler, Frame verworfen: {}", e);
                continue;
            }
        };

        let gesamt = samples * inner.kanaele;
        match inner.geraet.schreiben(&pcm[..gesamt]) {
            Ok(()) => {
                inner
                    .bytes_gespielt
                    .fetch_add((gesamt * 2) as u64, Ordering::Relaxed);
                inner.frames_gespielt.fetch_add(1, Ordering::Relaxed);
            }
            Err(AudioError::PufferVoll) => {
                warn!("Geraete-Puffer voll, PCM-Frame verworfen");
            }
            Err(e) => {
                warn!("Geraete-Fehler, Wiedergabe wird beendet: {}", e);
                zustand_setzen(&inner, WiedergabeZustand::Fehler);
                break;
            }
        }

        // Begrenzte CPU-Last unter Dauervolllast
        std::thread::sleep(WORKER_PAUSE);
    }

    debug!("Wiedergabe-Worker beendet");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Geteilter Session-Zustand
//!
//! Wird zwischen der Pump-Task der Engine, den Handles und der Fassade
//! geteilt. Flags sind atomar, zusammengesetzte Felder liegen hinter
//! eigenen Mutexes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Liveness-Fenster: ohne eingehende Frames gilt die Session als tot
pub const LIVENESS_FENSTER: Duration = Duration::from_secs(120);

/// Downlink-Standardwerte bis das Server-Hello eintrifft
pub const STANDARD_SERVER_SAMPLE_RATE: u32 = 24000;
pub const STANDARD_SERVER_FRAME_DAUER: u32 = 60;

/// Session-Zustand der Protokoll-Engine
pub struct SessionZustand {
    verbunden: AtomicBool,
    hello_empfangen: AtomicBool,
    fehler_aufgetreten: AtomicBool,
    session_id: Mutex<Option<String>>,
    /// (sample_rate, frame_duration_ms) des Downlink-Streams
    server_format: Mutex<(u32, u32)>,
    letzter_eingang: Mutex<Instant>,
}

impl Default for SessionZustand {
    fn default() -> Self {
        Self::neu()
    }
}

impl SessionZustand {
    /// Erstellt den Zustand mit den Downlink-Standardwerten
    pub fn neu() -> Self {
        Self {
            verbunden: AtomicBool::new(false),
            hello_empfangen: AtomicBool::new(false),
            fehler_aufgetreten: AtomicBool::new(false),
            session_id: Mutex::new(None),
            server_format: Mutex::new((STANDARD_SERVER_SAMPLE_RATE, STANDARD_SERVER_FRAME_DAUER)),
            letzter_eingang: Mutex::new(Instant::now()),
        }
    }

    pub fn ist_verbunden(&self) -> bool {
        self.verbunden.load(Ordering::SeqCst)
    }

    pub fn verbunden_setzen(&self, wert: bool) {
        self.verbunden.store(wert, Ordering::SeqCst);
    }

    pub fn hello_empfangen(&self) -> bool {
        self.hello_empfangen.load(Ordering::SeqCst)
    }

    pub fn hello_empfangen_setzen(&self) {
        self.hello_empfangen.store(true, Ordering::SeqCst);
    }

    pub fn fehler_aufgetreten(&self) -> bool {
        self.fehler_aufgetreten.load(Ordering::SeqCst)
    }

    pub fn fehler_setzen(&self) {
        self.fehler_aufgetreten.store(true, Ordering::SeqCst);
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    pub fn session_id_setzen(&self, id: Option<String>) {
        *self.session_id.lock() = id;
    }

    /// Downlink-Format (sample_rate, frame_duration_ms)
    pub fn server_format(&self) -> (u32, u32) {
        *self.server_format.lock()
    }

    pub fn server_format_setzen(&self, sample_rate: Option<u32>, frame_dauer: Option<u32>) {
        let mut format = self.server_format.lock();
        if let Some(rate) = sample_rate {
            format.0 = rate;
        }
        if let Some(dauer) = frame_dauer {
            format.1 = dauer;
        }
    }

    /// Vermerkt einen eingehenden Frame (Text oder Binaer)
    pub fn eingang_vermerken(&self) {
        *self.letzter_eingang.lock() = Instant::now();
    }

    /// Zeit seit dem letzten eingehenden Frame
    pub fn zeit_seit_eingang(&self) -> Duration {
        self.letzter_eingang.lock().elapsed()
    }

    /// Liveness-Pruefung fuer hoehere Schichten
    pub fn ist_timeout(&self) -> bool {
        self.zeit_seit_eingang() > LIVENESS_FENSTER
    }

    #[cfg(test)]
    pub(crate) fn letzten_eingang_setzen(&self, zeitpunkt: Instant) {
        *self.letzter_eingang.lock() = zeitpunkt;
    }
}

//! Stub-Backend fuer Tests und Headless-Betrieb
//!
//! Verhaelt sich wie das cpal-Backend, nur ohne Host-Streams: die
//! Host-Callback-Seite wird ueber `capture_einspeisen` und
//! `playback_abziehen` von Hand getrieben.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::device::{AudioGeraet, GeraetKonfig, LESE_FRIST};
use crate::error::{AudioError, AudioResult};
use crate::ring_buffer::SyncRingBuffer;

/// In-Memory-Geraet ohne Audio-Hardware
#[derive(Default)]
pub struct StubGeraet {
    capture_rb: RwLock<Option<Arc<SyncRingBuffer<i16>>>>,
    playback_rb: RwLock<Option<Arc<SyncRingBuffer<i16>>>>,
    capture_aktiv: AtomicBool,
    playback_aktiv: AtomicBool,
}

impl StubGeraet {
    /// Erstellt ein unkonfiguriertes Stub-Geraet
    pub fn neu() -> Self {
        Self::default()
    }

    /// Host-Callback-Seite: speist Capture-Samples ein (verwerfend bei
    /// Ueberlauf), gibt die Anzahl verworfener Samples zurueck
    pub fn capture_einspeisen(&self, samples: &[i16]) -> usize {
        match self.capture_rb.read().as_ref() {
            Some(rb) => rb.schreiben_verwerfend(samples),
            None => samples.len(),
        }
    }

    /// Host-Callback-Seite: zieht `anzahl` Samples aus dem Wiedergabe-Buffer
    /// ab; fehlende Samples werden als Stille geliefert
    pub fn playback_abziehen(&self, anzahl: usize) -> Vec<i16> {
        let mut ziel = vec![0i16; anzahl];
        if let Some(rb) = self.playback_rb.read().as_ref() {
            rb.lesen_verfuegbar(&mut ziel);
        }
        ziel
    }

    /// Anzahl der Samples im Wiedergabe-Buffer
    pub fn playback_belegt(&self) -> usize {
        self.playback_rb
            .read()
            .as_ref()
            .map(|rb| rb.belegt())
            .unwrap_or(0)
    }

    pub fn ist_capture_aktiv(&self) -> bool {
        self.capture_aktiv.load(Ordering::Relaxed)
    }

    pub fn ist_playback_aktiv(&self) -> bool {
        self.playback_aktiv.load(Ordering::Relaxed)
    }
}

impl AudioGeraet for StubGeraet {
    fn konfigurieren(&self, konfig: &GeraetKonfig) -> AudioResult<()> {
        konfig
            .format
            .validieren()
            .map_err(AudioError::UngueltigerParameter)?;
        let kanaele = konfig.format.channels as usize;
        *self.capture_rb.write() = Some(Arc::new(SyncRingBuffer::neu(
            konfig.capture_puffer * kanaele,
        )));
        *self.playback_rb.write() = Some(Arc::new(SyncRingBuffer::neu(
            konfig.playback_puffer * kanaele,
        )));
        Ok(())
    }

    fn capture_starten(&self) -> AudioResult<()> {
        if self.capture_rb.read().is_none() {
            return Err(AudioError::NichtInitialisiert(
                "Geraet nicht konfiguriert".into(),
            ));
        }
        self.capture_aktiv.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn playback_starten(&self) -> AudioResult<()> {
        if self.playback_rb.read().is_none() {
            return Err(AudioError::NichtInitialisiert(
                "Geraet nicht konfiguriert".into(),
            ));
        }
        self.playback_aktiv.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn lesen(&self, ziel: &mut [i16]) -> AudioResult<()> {
        let rb = self
            .capture_rb
            .read()
            .clone()
            .ok_or_else(|| AudioError::NichtInitialisiert("Geraet nicht konfiguriert".into()))?;
        rb.lesen_blockierend(ziel, LESE_FRIST)
    }

    fn schreiben(&self, daten: &[i16]) -> AudioResult<()> {
        let rb = self
            .playback_rb
            .read()
            .clone()
            .ok_or_else(|| AudioError::NichtInitialisiert("Geraet nicht konfiguriert".into()))?;
        rb.schreiben_alles(daten)
    }

    fn playback_leer(&self) -> bool {
        self.playback_rb
            .read()
            .as_ref()
            .map(|rb| rb.ist_leer())
            .unwrap_or(true)
    }

    fn stoppen(&self) -> AudioResult<()> {
        self.capture_aktiv.store(false, Ordering::Relaxed);
        self.playback_aktiv.store(false, Ordering::Relaxed);
        if let Some(rb) = self.capture_rb.read().as_ref() {
            rb.aufwecken();
        }
        *self.capture_rb.write() = None;
        *self.playback_rb.write() = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

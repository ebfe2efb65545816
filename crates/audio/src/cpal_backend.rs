//! cpal-Backend fuer die Vollduplex-Geraete-Abstraktion
//!
//! cpal-Streams sind nicht `Send`; sie leben deshalb auf einem eigenen
//! Geraete-Thread der ueber crossbeam-channel gesteuert wird. Die
//! Host-Callbacks schreiben in den Capture-Ring-Buffer bzw. lesen aus dem
//! Wiedergabe-Ring-Buffer; bei Unterlauf wird Stille ausgegeben.

use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, trace};

use voicelink_core::types::AudioFormat;

use crate::device::{AudioGeraet, GeraetKonfig, LESE_FRIST};
use crate::error::{AudioError, AudioResult};
use crate::ring_buffer::SyncRingBuffer;

/// Frist fuer Antworten des Geraete-Threads
const BEFEHL_FRIST: Duration = Duration::from_secs(2);

/// Kommandos an den Geraete-Thread
enum GeraetBefehl {
    CaptureStarten(Sender<AudioResult<()>>),
    PlaybackStarten(Sender<AudioResult<()>>),
    Stoppen,
}

/// Vollduplex-Geraet auf Basis von cpal
pub struct CpalGeraet {
    input_name: Option<String>,
    output_name: Option<String>,
    befehle: Mutex<Option<Sender<GeraetBefehl>>>,
    capture_rb: RwLock<Option<Arc<SyncRingBuffer<i16>>>>,
    playback_rb: RwLock<Option<Arc<SyncRingBuffer<i16>>>>,
}

impl CpalGeraet {
    /// Erstellt ein Geraet; `None` waehlt das jeweilige Standard-Geraet
    pub fn neu(input_name: Option<String>, output_name: Option<String>) -> Self {
        Self {
            input_name,
            output_name,
            befehle: Mutex::new(None),
            capture_rb: RwLock::new(None),
            playback_rb: RwLock::new(None),
        }
    }

    fn befehl_senden(&self, bauen: impl FnOnce(Sender<AudioResult<()>>) -> GeraetBefehl) -> AudioResult<()> {
        let sender = self
            .befehle
            .lock()
            .clone()
            .ok_or_else(|| AudioError::NichtInitialisiert("Geraet nicht konfiguriert".into()))?;
        let (antwort_tx, antwort_rx) = bounded(1);
        sender
            .send(bauen(antwort_tx))
            .map_err(|_| AudioError::StreamFehler("Geraete-Thread beendet".into()))?;
        antwort_rx
            .recv_timeout(BEFEHL_FRIST)
            .map_err(|_| AudioError::Zeitlimit)?
    }
}

impl AudioGeraet for CpalGeraet {
    fn konfigurieren(&self, konfig: &GeraetKonfig) -> AudioResult<()> {
        konfig
            .format
            .validieren()
            .map_err(AudioError::UngueltigerParameter)?;

        // Laufenden Geraete-Thread zuerst beenden
        if let Some(alt) = self.befehle.lock().take() {
            let _ = alt.send(GeraetBefehl::Stoppen);
        }

        let kanaele = konfig.format.channels as usize;
        let capture = Arc::new(SyncRingBuffer::neu(konfig.capture_puffer * kanaele));
        let playback = Arc::new(SyncRingBuffer::neu(konfig.playback_puffer * kanaele));
        *self.capture_rb.write() = Some(Arc::clone(&capture));
        *self.playback_rb.write() = Some(Arc::clone(&playback));

        let (tx, rx) = bounded::<GeraetBefehl>(8);
        let input_name = self.input_name.clone();
        let output_name = self.output_name.clone();
        let format = konfig.format;

        std::thread::Builder::new()
            .name("voicelink-geraet".to_string())
            .spawn(move || {
                geraete_thread(rx, input_name, output_name, format, capture, playback);
            })
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

        *self.befehle.lock() = Some(tx);
        info!(
            "Geraet konfiguriert: {}Hz {}ch, Puffer {}/{} Samples",
            konfig.format.sample_rate, konfig.format.channels, konfig.capture_puffer,
            konfig.playback_puffer
        );
        Ok(())
    }

    fn capture_starten(&self) -> AudioResult<()> {
        self.befehl_senden(GeraetBefehl::CaptureStarten)
    }

    fn playback_starten(&self) -> AudioResult<()> {
        self.befehl_senden(GeraetBefehl::PlaybackStarten)
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
        if let Some(sender) = self.befehle.lock().take() {
            let _ = sender.send(GeraetBefehl::Stoppen);
        }
        // Blockierte Leser aufwecken bevor die Puffer freigegeben werden
        if let Some(rb) = self.capture_rb.read().as_ref() {
            rb.aufwecken();
        }
        *self.capture_rb.write() = None;
        *self.playback_rb.write() = None;
        debug!("Geraet gestoppt");
        Ok(())
    }
}

impl Drop for CpalGeraet {
    fn drop(&mut self) {
        let _ = self.stoppen();
    }
}

// ---------------------------------------------------------------------------
// Geraete-Thread
// ---------------------------------------------------------------------------

/// Haelt die cpal-Streams am Leben und verarbeitet Steuerkommandos
fn geraete_thread(
    rx: Receiver<GeraetBefehl>,
    input_name: Option<String>,
    output_name: Option<String>,
    format: AudioFormat,
    capture_rb: Arc<SyncRingBuffer<i16>>,
    playback_rb: Arc<SyncRingBuffer<i16>>,
) {
    let mut _input: Option<Stream> = None;
    let mut _output: Option<Stream> = None;

    debug!("Geraete-Thread gestartet");

    while let Ok(befehl) = rx.recv() {
        match befehl {
            GeraetBefehl::CaptureStarten(antwort) => {
                let result = input_stream_oeffnen(input_name.as_deref(), &format, &capture_rb);
                match result {
                    Ok(stream) => {
                        _input = Some(stream);
                        let _ = antwort.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = antwort.send(Err(e));
                    }
                }
            }
            GeraetBefehl::PlaybackStarten(antwort) => {
                let result = output_stream_oeffnen(output_name.as_deref(), &format, &playback_rb);
                match result {
                    Ok(stream) => {
                        _output = Some(stream);
                        let _ = antwort.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = antwort.send(Err(e));
                    }
                }
            }
            GeraetBefehl::Stoppen => break,
        }
    }

    debug!("Geraete-Thread beendet");
}

/// Laedt ein cpal-Eingabegeraet anhand des Namens
fn input_geraet_laden(name: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_input_device()
            .ok_or(AudioError::KeinStandardEingabegeraet),
        Some(n) => {
            let devices = host
                .input_devices()
                .map_err(|e| AudioError::StreamFehler(e.to_string()))?;
            for device in devices {
                if let Ok(dev_name) = device.name() {
                    if dev_name.contains(n) {
                        return Ok(device);
                    }
                }
            }
            Err(AudioError::GeraetNichtGefunden(n.to_string()))
        }
    }
}

/// Laedt ein cpal-Ausgabegeraet anhand des Namens
fn output_geraet_laden(name: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_output_device()
            .ok_or(AudioError::KeinStandardAusgabegeraet),
        Some(n) => {
            let devices = host
                .output_devices()
                .map_err(|e| AudioError::StreamFehler(e.to_string()))?;
            for device in devices {
                if let Ok(dev_name) = device.name() {
                    if dev_name.contains(n) {
                        return Ok(device);
                    }
                }
            }
            Err(AudioError::GeraetNichtGefunden(n.to_string()))
        }
    }
}

/// Oeffnet den Capture-Stream; der Callback schreibt in den Ring-Buffer
fn input_stream_oeffnen(
    name: Option<&str>,
    format: &AudioFormat,
    rb: &Arc<SyncRingBuffer<i16>>,
) -> AudioResult<Stream> {
    let device = input_geraet_laden(name)?;
    let stream_config = StreamConfig {
        channels: format.channels as u16,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let err_fn = |err| error!("Capture-Fehler: {}", err);

    let supported = device
        .supported_input_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        .find(|c| {
            c.min_sample_rate().0 <= format.sample_rate
                && c.max_sample_rate().0 >= format.sample_rate
                && c.channels() >= format.channels as u16
        });

    let sample_format = supported
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::I16);

    let stream = match sample_format {
        SampleFormat::I16 => {
            let rb = Arc::clone(rb);
            device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _| {
                        rb.schreiben_verwerfend(data);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        }
        SampleFormat::F32 => {
            let rb = Arc::clone(rb);
            device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _| {
                        let samples: Vec<i16> = data
                            .iter()
                            .map(|&s| (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32)
                                as i16)
                            .collect();
                        rb.schreiben_verwerfend(&samples);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        }
        _ => {
            return Err(AudioError::FormatNichtUnterstuetzt(format!(
                "Sample-Format: {:?}",
                sample_format
            )))
        }
    };

    stream
        .play()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    debug!(
        "Capture-Stream geoeffnet: {}Hz {}ch",
        format.sample_rate, format.channels
    );
    Ok(stream)
}

/// Oeffnet den Wiedergabe-Stream; der Callback liest aus dem Ring-Buffer
/// und fuellt fehlende Samples mit Stille
fn output_stream_oeffnen(
    name: Option<&str>,
    format: &AudioFormat,
    rb: &Arc<SyncRingBuffer<i16>>,
) -> AudioResult<Stream> {
    let device = output_geraet_laden(name)?;
    let stream_config = StreamConfig {
        channels: format.channels as u16,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let err_fn = |err| error!("Playback-Fehler: {}", err);

    let supported = device
        .supported_output_configs()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        .find(|c| {
            c.min_sample_rate().0 <= format.sample_rate
                && c.max_sample_rate().0 >= format.sample_rate
                && c.channels() >= format.channels as u16
        });

    let sample_format = supported
        .map(|c| c.sample_format())
        .unwrap_or(SampleFormat::I16);

    let stream = match sample_format {
        SampleFormat::I16 => {
            let rb = Arc::clone(rb);
            device
                .build_output_stream(
                    &stream_config,
                    move |data: &mut [i16], _| {
                        let gelesen = rb.lesen_verfuegbar(data);
                        if gelesen < data.len() {
                            trace!("Playback-Unterlauf: {} Samples fehlen", data.len() - gelesen);
                            data[gelesen..].fill(0);
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        }
        SampleFormat::F32 => {
            let rb = Arc::clone(rb);
            device
                .build_output_stream(
                    &stream_config,
                    move |data: &mut [f32], _| {
                        let mut zwischen = vec![0i16; data.len()];
                        let gelesen = rb.lesen_verfuegbar(&mut zwischen);
                        if gelesen < data.len() {
                            trace!("Playback-Unterlauf: {} Samples fehlen", data.len() - gelesen);
                        }
                        for (out, s) in data.iter_mut().zip(zwischen.iter()) {
                            *out = *s as f32 / i16::MAX as f32;
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| AudioError::StreamFehler(e.to_string()))?
        }
        _ => {
            return Err(AudioError::FormatNichtUnterstuetzt(format!(
                "Sample-Format: {:?}",
                sample_format
            )))
        }
    };

    stream
        .play()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    debug!(
        "Playback-Stream geoeffnet: {}Hz {}ch",
        format.sample_rate, format.channels
    );
    Ok(stream)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Vollduplex-Geraete-Abstraktion und Geraete-Enumeration
//!
//! Das Geraet besitzt zwei Ring-Buffer (Capture und Wiedergabe). Die
//! Host-Callbacks laufen auf Threads der Audio-Bibliothek; Benutzer-Aufrufe
//! kommen von eigenen Threads. Zugriff auf die Buffer gibt es nur ueber
//! `lesen`/`schreiben`.

use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::{debug, warn};

use voicelink_core::types::AudioFormat;

use crate::error::{AudioError, AudioResult};

/// Frist fuer blockierendes Lesen vom Capture-Buffer
pub const LESE_FRIST: Duration = Duration::from_millis(1000);

// ---------------------------------------------------------------------------
// Geraete-Trait
// ---------------------------------------------------------------------------

/// Puffer- und Format-Konfiguration eines Vollduplex-Geraets
#[derive(Debug, Clone)]
pub struct GeraetKonfig {
    /// PCM-Format fuer beide Richtungen
    pub format: AudioFormat,
    /// Capture-Ring-Buffer-Groesse in Samples pro Kanal
    pub capture_puffer: usize,
    /// Wiedergabe-Ring-Buffer-Groesse in Samples pro Kanal
    pub playback_puffer: usize,
}

impl Default for GeraetKonfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            capture_puffer: 16000,
            playback_puffer: 16000,
        }
    }
}

/// Vollduplex-PCM-Geraet
///
/// `konfigurieren` muss vor allen anderen Aufrufen erfolgen und allokiert
/// die Ring-Buffer. `stoppen` beendet laufende Streams und gibt die Puffer
/// frei; danach ist eine Neu-Konfiguration erlaubt.
pub trait AudioGeraet: Send + Sync {
    /// Konfiguriert das Geraet und allokiert beide Ring-Buffer
    fn konfigurieren(&self, konfig: &GeraetKonfig) -> AudioResult<()>;

    /// Startet den Capture-Strom (Host-Callback fuellt den Capture-Buffer)
    fn capture_starten(&self) -> AudioResult<()>;

    /// Startet den Wiedergabe-Strom (Host-Callback leert den Wiedergabe-Buffer)
    fn playback_starten(&self) -> AudioResult<()>;

    /// Blockierendes Lesen von exakt `ziel.len()` Samples (bis zu 1 s)
    fn lesen(&self, ziel: &mut [i16]) -> AudioResult<()>;

    /// Nicht-blockierendes Schreiben; schlaegt mit `PufferVoll` fehl wenn
    /// nicht genug Platz fuer den gesamten Block ist
    fn schreiben(&self, daten: &[i16]) -> AudioResult<()>;

    /// Prueft ob der Wiedergabe-Buffer leer ist
    fn playback_leer(&self) -> bool;

    /// Stoppt Streams, weckt Blockierte und gibt die Puffer frei
    fn stoppen(&self) -> AudioResult<()>;
}

// ---------------------------------------------------------------------------
// Geraete-Enumeration
// ---------------------------------------------------------------------------

/// Repraesentiert ein Audio-Geraet mit seinen Eigenschaften
#[derive(Debug, Clone)]
pub struct AudioGeraetInfo {
    /// Interner Bezeichner
    pub id: String,
    /// Anzeigename des Geraets
    pub name: String,
    /// Unterstuetzte Abtastraten
    pub sample_rates: Vec<u32>,
    /// Maximale Kanalanzahl
    pub channels: u16,
}

/// Listet alle verfuegbaren Eingabegeraete auf
pub fn list_input_devices() -> AudioResult<Vec<AudioGeraetInfo>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    let mut result = Vec::new();
    for device in devices {
        match device_zu_info(&device) {
            Ok(info) => result.push(info),
            Err(e) => warn!("Eingabegeraet konnte nicht gelesen werden: {}", e),
        }
    }
    debug!("Gefundene Eingabegeraete: {}", result.len());
    Ok(result)
}

/// Listet alle verfuegbaren Ausgabegeraete auf
pub fn list_output_devices() -> AudioResult<Vec<AudioGeraetInfo>> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    let mut result = Vec::new();
    for device in devices {
        match device_zu_info(&device) {
            Ok(info) => result.push(info),
            Err(e) => warn!("Ausgabegeraet konnte nicht gelesen werden: {}", e),
        }
    }
    debug!("Gefundene Ausgabegeraete: {}", result.len());
    Ok(result)
}

/// Gibt das Standard-Eingabegeraet zurueck
pub fn get_default_input() -> Option<AudioGeraetInfo> {
    let host = cpal::default_host();
    host.default_input_device()
        .and_then(|d| device_zu_info(&d).ok())
}

/// Gibt das Standard-Ausgabegeraet zurueck
pub fn get_default_output() -> Option<AudioGeraetInfo> {
    let host = cpal::default_host();
    host.default_output_device()
        .and_then(|d| device_zu_info(&d).ok())
}

// Hilfsfunktion: cpal Device -> AudioGeraetInfo
fn device_zu_info(device: &cpal::Device) -> AudioResult<AudioGeraetInfo> {
    let name = device
        .name()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    let mut sample_rates = Vec::new();
    let mut max_channels = 1u16;

    if let Ok(configs) = device.supported_input_configs() {
        for cfg in configs {
            let min = cfg.min_sample_rate().0;
            let max = cfg.max_sample_rate().0;
            // Gaengige Raten pruefen
            for rate in [8000u32, 16000, 24000, 44100, 48000] {
                if rate >= min && rate <= max && !sample_rates.contains(&rate) {
                    sample_rates.push(rate);
                }
            }
            if cfg.channels() > max_channels {
                max_channels = cfg.channels();
            }
        }
    }
    if let Ok(configs) = device.supported_output_configs() {
        for cfg in configs {
            let min = cfg.min_sample_rate().0;
            let max = cfg.max_sample_rate().0;
            for rate in [8000u32, 16000, 24000, 44100, 48000] {
                if rate >= min && rate <= max && !sample_rates.contains(&rate) {
                    sample_rates.push(rate);
                }
            }
            if cfg.channels() > max_channels {
                max_channels = cfg.channels();
            }
        }
    }

    sample_rates.sort_unstable();

    Ok(AudioGeraetInfo {
        id: name.clone(),
        name,
        sample_rates,
        channels: max_channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn eingabegeraete_auflistbar() {
        let devices = list_input_devices().expect("Liste sollte abrufbar sein");
        println!(
            "Eingabegeraete: {:?}",
            devices.iter().map(|d| &d.name).collect::<Vec<_>>()
        );
    }

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn ausgabegeraete_auflistbar() {
        let devices = list_output_devices().expect("Liste sollte abrufbar sein");
        println!(
            "Ausgabegeraete: {:?}",
            devices.iter().map(|d| &d.name).collect::<Vec<_>>()
        );
    }

    #[test]
    fn geraet_konfig_standard() {
        let konfig = GeraetKonfig::default();
        assert_eq!(konfig.format.sample_rate, 16000);
        assert!(konfig.capture_puffer > 0);
        assert!(konfig.playback_puffer > 0);
    }

    #[test]
    fn geraet_info_felder() {
        let info = AudioGeraetInfo {
            id: "test-id".to_string(),
            name: "Test Mikrofon".to_string(),
            sample_rates: vec![16000, 48000],
            channels: 1,
        };
        assert_eq!(info.id, "test-id");
        assert_eq!(info.channels, 1);
        assert!(info.sample_rates.contains(&16000));
    }
}

//! Gemeinsame Audio- und Zustands-Werttypen
//!
//! Kleine, kopierbare Typen die zwischen Codec, Wire-Format, Wiedergabe
//! und Fassade ausgetauscht werden. Grosse Nutzdaten (Opus-Bytes) leben
//! exklusiv in `AudioFrame` und wandern per Move durch die Queues.

use serde::{Deserialize, Serialize};

/// Maximale Groesse eines einzelnen Opus-Pakets in Bytes
pub const MAX_FRAME_NUTZDATEN: usize = 4000;

// ---------------------------------------------------------------------------
// AudioFormat
// ---------------------------------------------------------------------------

/// PCM-Format fuer Capture, Wiedergabe und Codec
///
/// Nach der Initialisierung von Codec oder Geraet unveraenderlich;
/// eine Aenderung erfordert Neu-Initialisierung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Kanalanzahl (1 = Mono, 2 = Stereo)
    pub channels: u8,
    /// Bits pro Sample (immer 16 fuer signed PCM)
    pub bits_per_sample: u8,
    /// Frame-Dauer in Millisekunden
    pub frame_duration_ms: u32,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            bits_per_sample: 16,
            frame_duration_ms: 20,
        }
    }
}

impl AudioFormat {
    /// Erstellt ein Format mit 16-bit Samples
    pub fn neu(sample_rate: u32, channels: u8, frame_duration_ms: u32) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: 16,
            frame_duration_ms,
        }
    }

    /// Anzahl der Samples pro Frame und Kanal
    pub fn samples_pro_frame(&self) -> usize {
        (self.sample_rate as usize * self.frame_duration_ms as usize) / 1000
    }

    /// Anzahl der Samples pro Frame ueber alle Kanaele
    pub fn samples_pro_frame_gesamt(&self) -> usize {
        self.samples_pro_frame() * self.channels as usize
    }

    /// Validiert die Format-Parameter
    pub fn validieren(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("Abtastrate darf nicht 0 sein".into());
        }
        if self.channels == 0 || self.channels > 2 {
            return Err(format!(
                "Kanalanzahl muss 1 oder 2 sein (war: {})",
                self.channels
            ));
        }
        if self.bits_per_sample != 16 {
            return Err(format!(
                "Nur 16-bit PCM wird unterstuetzt (war: {})",
                self.bits_per_sample
            ));
        }
        if self.frame_duration_ms == 0 {
            return Err("Frame-Dauer darf nicht 0 sein".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// Ein kodierter Audio-Frame (ein Opus-Paket) mit Timing-Metadaten
///
/// Der Besitz liegt exklusiv bei der Queue die den Frame gerade haelt;
/// Weitergabe erfolgt per Move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFrame {
    /// Abtastrate der kodierten Daten in Hz
    pub sample_rate: u32,
    /// Frame-Dauer in Millisekunden
    pub frame_duration_ms: u32,
    /// Zeitstempel in Millisekunden (0 wenn der Transport keinen traegt)
    pub timestamp_ms: u32,
    /// Opus-Nutzdaten (max. `MAX_FRAME_NUTZDATEN` Bytes)
    pub payload: Vec<u8>,
}

impl AudioFrame {
    /// Erstellt einen neuen Frame
    pub fn neu(sample_rate: u32, frame_duration_ms: u32, timestamp_ms: u32, payload: Vec<u8>) -> Self {
        Self {
            sample_rate,
            frame_duration_ms,
            timestamp_ms,
            payload,
        }
    }

    /// Gibt die Nutzdaten-Laenge in Bytes zurueck
    pub fn nutzdaten_laenge(&self) -> usize {
        self.payload.len()
    }
}

// ---------------------------------------------------------------------------
// Hoer-Modus
// ---------------------------------------------------------------------------

/// Modus fuer das Starten des Hoerens (Wire-Feld `mode`)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoerModus {
    /// Server beendet das Hoeren automatisch (VAD-gesteuert)
    #[default]
    Auto,
    /// Client beendet das Hoeren explizit
    Manual,
    /// Dauerhaftes Hoeren, auch waehrend der Server spricht
    Realtime,
}

impl HoerModus {
    /// Gibt den Wire-Wert fuer das `mode`-Feld zurueck
    pub fn als_wire(&self) -> &'static str {
        match self {
            HoerModus::Auto => "auto",
            HoerModus::Manual => "manual",
            HoerModus::Realtime => "realtime",
        }
    }
}

// ---------------------------------------------------------------------------
// Ablauf- und Wiedergabe-Zustaende
// ---------------------------------------------------------------------------

/// Phase eines servergesteuerten Ablaufs (Hoeren bzw. TTS)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ablaufzustand {
    /// Noch nicht gestartet
    #[default]
    Leerlauf,
    /// Laeuft gerade
    Gestartet,
    /// Beendet
    Gestoppt,
}

/// Zustand der Wiedergabe-Engine
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WiedergabeZustand {
    /// Engine erstellt, Worker nicht gestartet
    #[default]
    Leerlauf,
    /// Worker dekodiert und schreibt PCM
    Spielt,
    /// Worker angehalten, Puffer bleibt erhalten
    Pausiert,
    /// Worker beendet
    Gestoppt,
    /// Nicht behebbarer Fehler
    Fehler,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_standardwerte() {
        let f = AudioFormat::default();
        assert_eq!(f.sample_rate, 16000);
        assert_eq!(f.channels, 1);
        assert_eq!(f.bits_per_sample, 16);
        assert_eq!(f.frame_duration_ms, 20);
    }

    #[test]
    fn format_samples_pro_frame() {
        // 20ms bei 16kHz = 320 Samples
        let f = AudioFormat::default();
        assert_eq!(f.samples_pro_frame(), 320);

        // 60ms bei 24kHz = 1440 Samples
        let f = AudioFormat::neu(24000, 1, 60);
        assert_eq!(f.samples_pro_frame(), 1440);

        // Stereo verdoppelt die Gesamtzahl
        let f = AudioFormat::neu(48000, 2, 20);
        assert_eq!(f.samples_pro_frame_gesamt(), 1920);
    }

    #[test]
    fn format_validierung() {
        assert!(AudioFormat::default().validieren().is_ok());

        let mut f = AudioFormat::default();
        f.sample_rate = 0;
        assert!(f.validieren().is_err());

        let mut f = AudioFormat::default();
        f.channels = 3;
        assert!(f.validieren().is_err());

        let mut f = AudioFormat::default();
        f.bits_per_sample = 24;
        assert!(f.validieren().is_err());
    }

    #[test]
    fn frame_erstellen() {
        let frame = AudioFrame::neu(16000, 20, 1234, vec![0xAB; 60]);
        assert_eq!(frame.nutzdaten_laenge(), 60);
        assert_eq!(frame.timestamp_ms, 1234);
    }

    #[test]
    fn frame_serde_round_trip() {
        let frame = AudioFrame::neu(24000, 60, 0, vec![1, 2, 3]);
        let json = serde_json::to_string(&frame).unwrap();
        let decoded: AudioFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(frame, decoded);
    }

    #[test]
    fn hoer_modus_wire_werte() {
        assert_eq!(HoerModus::Auto.als_wire(), "auto");
        assert_eq!(HoerModus::Manual.als_wire(), "manual");
        assert_eq!(HoerModus::Realtime.als_wire(), "realtime");
    }

    #[test]
    fn hoer_modus_serde() {
        let json = serde_json::to_string(&HoerModus::Realtime).unwrap();
        assert_eq!(json, "\"realtime\"");
        let decoded: HoerModus = serde_json::from_str("\"manual\"").unwrap();
        assert_eq!(decoded, HoerModus::Manual);
    }

    #[test]
    fn zustaende_standard() {
        assert_eq!(Ablaufzustand::default(), Ablaufzustand::Leerlauf);
        assert_eq!(WiedergabeZustand::default(), WiedergabeZustand::Leerlauf);
    }
}

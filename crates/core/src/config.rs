//! Client-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass das SDK ohne Konfigurationsdatei
//! lauffaehig ist (nur die Server-URL muss gesetzt werden).

use serde::{Deserialize, Serialize};

use crate::types::HoerModus;

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Verbindungs-Einstellungen
    pub verbindung: VerbindungsEinstellungen,
    /// Audio-Einstellungen
    pub audio: AudioEinstellungen,
    /// Hoer-Einstellungen
    pub hoeren: HoerEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Verbindungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbindungsEinstellungen {
    /// WebSocket-URL des Dialog-Servers
    pub server_url: String,
    /// Bearer-Token fuer den `Authorization`-Header (optional)
    pub auth_token: Option<String>,
    /// Geraete-Kennung fuer den `Device-Id`-Header (optional)
    pub device_id: Option<String>,
    /// Client-Kennung fuer den `Client-Id`-Header (None = generierte UUID)
    pub client_id: Option<String>,
    /// Version des Binaer-Protokolls (1, 2 oder 3)
    pub protocol_version: u8,
    /// Zeitlimit fuer den Verbindungsaufbau in Millisekunden
    pub timeout_ms: u64,
}

impl Default for VerbindungsEinstellungen {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            auth_token: None,
            device_id: None,
            client_id: None,
            protocol_version: 3,
            timeout_ms: 5000,
        }
    }
}

/// Audio-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    /// Abtastrate in Hz
    pub sample_rate: u32,
    /// Kanalanzahl
    pub channels: u8,
    /// Frame-Dauer in Millisekunden
    pub frame_duration_ms: u32,
    /// Capture-Ring-Buffer-Groesse in Samples pro Kanal
    pub capture_buffer: usize,
    /// Playback-Ring-Buffer-Groesse in Samples pro Kanal
    pub playback_buffer: usize,
    /// Byte-Puffer der Wiedergabe-Engine
    pub playback_ring_bytes: usize,
    /// Name des Eingabegeraets (None = Standard)
    pub input_device: Option<String>,
    /// Name des Ausgabegeraets (None = Standard)
    pub output_device: Option<String>,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            frame_duration_ms: 20,
            capture_buffer: 16000,
            playback_buffer: 16000,
            playback_ring_bytes: 64 * 1024,
            input_device: None,
            output_device: None,
        }
    }
}

/// Hoer-Einstellungen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HoerEinstellungen {
    /// Modus fuer `listen start`
    pub modus: HoerModus,
    /// Wake-Word das bei Erkennung gemeldet wird (optional)
    pub wake_word: Option<String>,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Validiert die Konfiguration
    pub fn validieren(&self) -> Result<(), String> {
        if self.verbindung.server_url.is_empty() {
            return Err("server_url darf nicht leer sein".into());
        }
        if !(1..=3).contains(&self.verbindung.protocol_version) {
            return Err(format!(
                "protocol_version muss 1, 2 oder 3 sein (war: {})",
                self.verbindung.protocol_version
            ));
        }
        if self.audio.sample_rate == 0 {
            return Err("sample_rate darf nicht 0 sein".into());
        }
        if self.audio.channels == 0 || self.audio.channels > 2 {
            return Err(format!(
                "channels muss 1 oder 2 sein (war: {})",
                self.audio.channels
            ));
        }
        Ok(())
    }

    /// Gibt die Client-Kennung zurueck, generiert eine UUID falls keine gesetzt ist
    pub fn client_id_oder_generiert(&self) -> String {
        self.verbindung
            .client_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

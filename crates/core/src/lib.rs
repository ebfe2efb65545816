//! voicelink-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Voicelink-Crates gemeinsam genutzt werden: Audio-Werttypen,
//! das Ereignis-Modell fuer Einbettungen, den zentralen Fehler-Enum,
//! die Konfigurationsoberflaeche und den Logging-Bootstrap.

pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use config::ClientConfig;
pub use error::{Result, VoicelinkError};
pub use event::{Ereignis, EreignisArt, EreignisCallback, FehlerQuelle, TextRolle};
pub use types::{Ablaufzustand, AudioFormat, AudioFrame, HoerModus, WiedergabeZustand};

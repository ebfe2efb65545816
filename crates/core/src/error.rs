//! Fehlertypen fuer Voicelink
//!
//! Zentraler Fehler-Enum der alle moeglichen Fehlerzustaende abdeckt.
//! Untermodule definieren eigene Fehler und konvertieren via `#[from]`
//! oder ueber die String-tragenden Varianten.

use thiserror::Error;

/// Globaler Result-Alias fuer Voicelink
pub type Result<T> = std::result::Result<T, VoicelinkError>;

/// Alle moeglichen Fehler im Voicelink-System
#[derive(Debug, Error)]
pub enum VoicelinkError {
    // --- Verbindung & Netzwerk ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    #[error("Nicht verbunden")]
    NichtVerbunden,

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    // --- Protokoll ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    #[error("Protokollversion nicht unterstuetzt: {0}")]
    ProtokollVersion(u8),

    // --- Aufrufer-Fehler ---
    #[error("Ungueltiger Parameter: {0}")]
    UngueltigerParameter(String),

    #[error("Nicht initialisiert: {0}")]
    NichtInitialisiert(String),

    #[error("Ungueltiger Zustand: {0}")]
    UngueltigerZustand(String),

    // --- Ressourcen ---
    #[error("Ressourcen-Limit erreicht: {0}")]
    RessourcenLimit(String),

    #[error("Puffer voll")]
    PufferVoll,

    // --- Subsysteme ---
    #[error("Audiofehler: {0}")]
    Audio(String),

    #[error("Codec-Fehler: {0}")]
    Codec(String),

    #[error("Werkzeug-Fehler: {0}")]
    Werkzeug(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl VoicelinkError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler wiederholbar sein koennte
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(
            self,
            Self::Zeitlimit(_) | Self::Verbindung(_) | Self::Getrennt(_) | Self::PufferVoll
        )
    }
}

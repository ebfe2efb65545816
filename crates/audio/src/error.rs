//! Fehlertypen fuer die Audio-Engine

use thiserror::Error;

/// Alle moeglichen Fehler der Audio-Engine
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    #[error("Kein Standard-Eingabegeraet verfuegbar")]
    KeinStandardEingabegeraet,

    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("Ungueltiger Parameter: {0}")]
    UngueltigerParameter(String),

    #[error("Initialisierung fehlgeschlagen: {0}")]
    InitialisierungFehlgeschlagen(String),

    #[error("Encoding fehlgeschlagen: {0}")]
    EncodingFehlgeschlagen(String),

    #[error("Decoding fehlgeschlagen: {0}")]
    DecodingFehlgeschlagen(String),

    #[error("Puffer zu klein: benoetigt {benoetigt}, vorhanden {vorhanden}")]
    PufferZuKlein { benoetigt: usize, vorhanden: usize },

    #[error("Format nicht unterstuetzt: {0}")]
    FormatNichtUnterstuetzt(String),

    #[error("Ring-Buffer voll")]
    PufferVoll,

    #[error("Zeitlimit beim Lesen ueberschritten")]
    Zeitlimit,

    #[error("Nicht initialisiert: {0}")]
    NichtInitialisiert(String),

    #[error("Ungueltiger Zustand: {0}")]
    UngueltigerZustand(String),

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),
}

pub type AudioResult<T> = Result<T, AudioError>;

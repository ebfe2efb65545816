//! Fehlertypen fuer die Session-Engine

use thiserror::Error;

/// Alle moeglichen Fehler der Session-Engine
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Nicht verbunden")]
    NichtVerbunden,

    #[error("Verbindung fehlgeschlagen: {0}")]
    VerbindungFehlgeschlagen(String),

    #[error("Handshake fehlgeschlagen: {0}")]
    Handshake(String),

    #[error("WebSocket-Fehler: {0}")]
    WebSocket(String),

    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    #[error("Ungueltige Konfiguration: {0}")]
    UngueltigeKonfiguration(String),

    #[error("Senden fehlgeschlagen: {0}")]
    SendenFehlgeschlagen(String),

    #[error("Zeitlimit beim Verbindungsaufbau")]
    Zeitlimit,

    #[error("Ungueltiger Zustand: {0}")]
    UngueltigerZustand(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

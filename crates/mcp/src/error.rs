//! Fehlertypen fuer den Tool-Server

use thiserror::Error;

/// Alle moeglichen Fehler des Tool-Servers
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Ungueltiger Parameter: {0}")]
    UngueltigerParameter(String),

    #[error("Ungueltiger Name: {0}")]
    NameUngueltig(String),

    #[error("Bereits vorhanden: {0}")]
    BereitsVorhanden(String),

    #[error("Ressourcen-Limit erreicht: {0}")]
    RessourcenLimit(String),

    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    #[error("Handler-Fehler: {0}")]
    Handler(String),
}

pub type McpResult<T> = Result<T, McpError>;

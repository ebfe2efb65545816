//! Werkzeug-Definition
//!
//! Ein `Tool` ist eine benannte, typisierte, parametrisierte Funktion die
//! beim Server registriert und vom entfernten Dialog-Modell aufgerufen
//! werden kann. Beim Registrieren wird die Definition geklont, der
//! Aufrufer behaelt seine Vorlage.

use std::sync::Arc;

use crate::error::{McpError, McpResult};
use crate::property::PropertyList;
use crate::value::ReturnValue;

/// Maximale Laenge eines Werkzeug-Namens
pub const MAX_WERKZEUG_NAME: usize = 255;

/// Maximale Laenge der Beschreibung
pub const MAX_BESCHREIBUNG: usize = 1023;

/// Handler-Signatur: erhaelt die Aufruf-Argumente, gibt das Ergebnis zurueck
pub type ToolHandler = Arc<dyn Fn(&PropertyList) -> McpResult<ReturnValue> + Send + Sync>;

/// Registrierbare Werkzeug-Definition
#[derive(Clone)]
pub struct Tool {
    pub name: String,
    pub beschreibung: String,
    pub parameter: PropertyList,
    pub handler: ToolHandler,
    /// Nur in der benutzer-gefilterten `tools/list`-Antwort sichtbar
    pub user_only: bool,
}

impl Tool {
    /// Erstellt ein Werkzeug
    ///
    /// # Fehler
    /// `NameUngueltig` bei leerem oder zu langem Namen bzw. zu langer
    /// Beschreibung.
    pub fn neu(
        name: impl Into<String>,
        beschreibung: impl Into<String>,
        parameter: PropertyList,
        handler: ToolHandler,
    ) -> McpResult<Self> {
        let name = name.into();
        let beschreibung = beschreibung.into();
        if name.is_empty() || name.len() > MAX_WERKZEUG_NAME {
            return Err(McpError::NameUngueltig(format!(
                "Werkzeug-Name muss 1–{} Zeichen lang sein",
                MAX_WERKZEUG_NAME
            )));
        }
        if beschreibung.len() > MAX_BESCHREIBUNG {
            return Err(McpError::NameUngueltig(format!(
                "Beschreibung zu lang: {} Zeichen (Maximum {})",
                beschreibung.len(),
                MAX_BESCHREIBUNG
            )));
        }
        Ok(Self {
            name,
            beschreibung,
            parameter,
            handler,
            user_only: false,
        })
    }

    /// Markiert das Werkzeug als benutzer-exklusiv
    pub fn user_only(mut self) -> Self {
        self.user_only = true;
        self
    }

    /// Eintrag fuer die `tools/list`-Antwort
    pub fn als_listen_eintrag(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.beschreibung,
            "inputSchema": self.parameter.json_schema(),
        })
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("parameter", &self.parameter.laenge())
            .field("user_only", &self.user_only)
            .finish()
    }
}

//! JSON-RPC 2.0 Router des Tool-Servers
//!
//! Verarbeitet eine eingehende Nachricht nach der anderen und antwortet
//! ueber die beim Start gesetzte Sende-Senke. Eingehende Protokoll-
//! Verletzungen (kaputtes JSON, falsche JSON-RPC-Version, fehlende
//! numerische id) werden geloggt und verworfen; ausgehende Fehler nutzen
//! die JSON-RPC-Fehlerform mit beschreibender Nachricht und gespiegelter id.

use tracing::{debug, warn};

use crate::error::{McpError, McpResult};
use crate::property::{PropertyList, PropertyValue};
use crate::tool::{Tool, ToolHandler};

/// Protokollversion die `initialize` zurueckgibt
pub const MCP_PROTOKOLL_VERSION: &str = "2024-11-05";

/// Maximale Anzahl registrierter Werkzeuge
pub const MAX_WERKZEUGE: usize = 64;

/// Maximale Laenge des Server-Namens
pub const MAX_SERVER_NAME: usize = 255;

/// Maximale Laenge der Server-Version
pub const MAX_SERVER_VERSION: usize = 63;

// JSON-RPC-Fehlercodes
const FEHLER_METHODE: i32 = -32601;
const FEHLER_PARAMETER: i32 = -32602;
const FEHLER_INTERN: i32 = -32603;

/// Senke fuer ausgehende Antworten (im Zielsystem der MCP-Umschlag der
/// Session-Engine)
pub type SendeSenke = Box<dyn Fn(&str) + Send + Sync>;

/// Callback fuer die Kamera-Capability aus `initialize`:
/// `(explain_url, token)`
pub type CapabilityCallback = Box<dyn Fn(&str, Option<&str>) + Send + Sync>;

// ---------------------------------------------------------------------------
// McpServer
// ---------------------------------------------------------------------------

/// Prozess-lokaler JSON-RPC 2.0 Endpunkt mit registrierten Werkzeugen
pub struct McpServer {
    name: String,
    version: String,
    werkzeuge: Vec<Tool>,
    senke: Option<SendeSenke>,
    camera_callback: Option<CapabilityCallback>,
}

impl McpServer {
    /// Erstellt einen Server mit Name und Version
    pub fn neu(name: impl Into<String>, version: impl Into<String>) -> McpResult<Self> {
        let name = name.into();
        let version = version.into();
        if name.is_empty() || name.len() > MAX_SERVER_NAME {
            return Err(McpError::NameUngueltig(format!(
                "Server-Name muss 1–{} Zeichen lang sein",
                MAX_SERVER_NAME
            )));
        }
        if version.len() > MAX_SERVER_VERSION {
            return Err(McpError::NameUngueltig(format!(
                "Server-Version zu lang (Maximum {})",
                MAX_SERVER_VERSION
            )));
        }
        Ok(Self {
            name,
            version,
            werkzeuge: Vec::new(),
            senke: None,
            camera_callback: None,
        })
    }

    /// Setzt die Sende-Senke fuer ausgehende Antworten
    pub fn senke_setzen(&mut self, senke: SendeSenke) {
        self.senke = Some(senke);
    }

    /// Registriert den Callback fuer die Kamera-Capability
    pub fn camera_callback_setzen(&mut self, callback: CapabilityCallback) {
        self.camera_callback = Some(callback);
    }

    /// Registriert ein Werkzeug (die Definition wird geklont)
    ///
    /// # Fehler
    /// - `BereitsVorhanden` bei doppeltem Namen
    /// - `RessourcenLimit` wenn das Werkzeug-Limit erreicht ist
    pub fn werkzeug_registrieren(&mut self, tool: &Tool) -> McpResult<()> {
        if self.werkzeuge.len() >= MAX_WERKZEUGE {
            return Err(McpError::RessourcenLimit(format!(
                "Maximal {} Werkzeuge",
                MAX_WERKZEUGE
            )));
        }
        if self.werkzeuge.iter().any(|t| t.name == tool.name) {
            return Err(McpError::BereitsVorhanden(tool.name.clone()));
        }
        self.werkzeuge.push(tool.clone());
        debug!(name = %tool.name, "Werkzeug registriert");
        Ok(())
    }

    /// Komfort-Helfer: baut und registriert ein Werkzeug in einem Schritt
    pub fn werkzeug_hinzufuegen(
        &mut self,
        name: impl Into<String>,
        beschreibung: impl Into<String>,
        parameter: PropertyList,
        handler: ToolHandler,
    ) -> McpResult<()> {
        let tool = Tool::neu(name, beschreibung, parameter, handler)?;
        self.werkzeug_registrieren(&tool)
    }

    /// Anzahl registrierter Werkzeuge
    pub fn werkzeug_anzahl(&self) -> usize {
        self.werkzeuge.len()
    }

    // -----------------------------------------------------------------------
    // Nachrichtenverarbeitung
    // -----------------------------------------------------------------------

    /// Verarbeitet eine eingehende JSON-RPC-Nachricht
    ///
    /// Notifications werden stillschweigend verworfen; Verletzungen des
    /// Protokolls werden geloggt und verworfen.
    pub fn nachricht_verarbeiten(&self, text: &str) {
        let nachricht: serde_json::Value = match serde_json::from_str(text) {
            Ok(wert) => wert,
            Err(e) => {
                warn!("MCP-Nachricht ist kein gueltiges JSON: {}", e);
                return;
            }
        };

        if nachricht["jsonrpc"] != "2.0" {
            warn!("MCP-Nachricht ohne jsonrpc 2.0 verworfen");
            return;
        }

        let methode = match nachricht["method"].as_str() {
            Some(m) => m,
            None => {
                warn!("MCP-Nachricht ohne method-Feld verworfen");
                return;
            }
        };

        // Notifications tragen keine id und erwarten keine Antwort
        if methode.starts_with("notifications/") {
            debug!(methode, "Notification verworfen");
            return;
        }

        let id = match nachricht["id"].as_i64() {
            Some(id) => id,
            None => {
                warn!(methode, "MCP-Anfrage ohne numerische id verworfen");
                return;
            }
        };

        let params = &nachricht["params"];
        match methode {
            "initialize" => self.initialize_verarbeiten(id, params),
            "tools/list" => self.tools_list_verarbeiten(id, params),
            "tools/call" => self.tools_call_verarbeiten(id, params),
            andere => {
                self.fehler_senden(
                    id,
                    FEHLER_METHODE,
                    &format!("Method not implemented: {}", andere),
                );
            }
        }
    }

    fn initialize_verarbeiten(&self, id: i64, params: &serde_json::Value) {
        // Erkannte Capabilities an registrierte Callbacks weiterreichen
        let camera = &params["capabilities"]["camera"];
        if camera.is_object() {
            if let Some(url) = camera["explain_url"].as_str() {
                if let Some(callback) = &self.camera_callback {
                    callback(url, camera["token"].as_str());
                }
            }
        }

        self.ergebnis_senden(
            id,
            serde_json::json!({
                "protocolVersion": MCP_PROTOKOLL_VERSION,
                "capabilities": {
                    "tools": { "listChanged": false },
                },
                "serverInfo": {
                    "name": self.name,
                    "version": self.version,
                },
            }),
        );
    }

    fn tools_list_verarbeiten(&self, id: i64, params: &serde_json::Value) {
        let nur_user_only = params["listUserOnlyTools"].as_bool().unwrap_or(false);
        let eintraege: Vec<serde_json::Value> = self
            .werkzeuge
            .iter()
            .filter(|tool| !nur_user_only || tool.user_only)
            .map(Tool::als_listen_eintrag)
            .collect();

        let mut ergebnis = serde_json::json!({ "tools": eintraege });
        // Keine echte Paginierung: der Cursor wird gespiegelt
        if let Some(cursor) = params["cursor"].as_str() {
            ergebnis["nextCursor"] = serde_json::json!(cursor);
        }
        self.ergebnis_senden(id, ergebnis);
    }

    fn tools_call_verarbeiten(&self, id: i64, params: &serde_json::Value) {
        let name = match params["name"].as_str() {
            Some(n) => n,
            None => {
                self.fehler_senden(id, FEHLER_PARAMETER, "Missing tool name");
                return;
            }
        };

        let tool = match self.werkzeuge.iter().find(|t| t.name == name) {
            Some(t) => t,
            None => {
                self.fehler_senden(id, FEHLER_PARAMETER, &format!("Unknown tool: {}", name));
                return;
            }
        };

        let argumente = match argumente_bauen(&tool.parameter, &params["arguments"]) {
            Ok(liste) => liste,
            Err(e) => {
                self.fehler_senden(id, FEHLER_PARAMETER, &e.to_string());
                return;
            }
        };

        match (tool.handler)(&argumente) {
            Ok(wert) => self.ergebnis_senden(id, wert.als_ergebnis()),
            Err(e) => self.fehler_senden(id, FEHLER_INTERN, &e.to_string()),
        }
    }

    fn ergebnis_senden(&self, id: i64, ergebnis: serde_json::Value) {
        self.antwort_senden(serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": ergebnis,
        }));
    }

    fn fehler_senden(&self, id: i64, code: i32, nachricht: &str) {
        self.antwort_senden(serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": nachricht },
        }));
    }

    fn antwort_senden(&self, antwort: serde_json::Value) {
        match &self.senke {
            Some(senke) => senke(&antwort.to_string()),
            None => warn!("Keine Sende-Senke gesetzt, Antwort verworfen"),
        }
    }
}

// ---------------------------------------------------------------------------
// Argument-Abbildung
// ---------------------------------------------------------------------------

/// Baut die Aufruf-Argumentliste aus den deklarierten Parametern und dem
/// `arguments`-Objekt. Fehlende Argumente lassen die Eigenschaft auf ihrem
/// Standardwert (bzw. ohne Wert); unbekannte Argumente werden ignoriert.
fn argumente_bauen(
    parameter: &PropertyList,
    arguments: &serde_json::Value,
) -> McpResult<PropertyList> {
    let mut liste = parameter.clone();

    if let Some(objekt) = arguments.as_object() {
        for (name, wert) in objekt {
            let property = match liste.finden_mut(name) {
                Some(p) => p,
                None => {
                    debug!(name, "Unbekanntes Argument ignoriert");
                    continue;
                }
            };
            let wert = match wert {
                serde_json::Value::Bool(b) => PropertyValue::Boolean(*b),
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(i) => PropertyValue::Integer(i),
                    None => {
                        return Err(McpError::UngueltigerParameter(format!(
                            "'{}' ist keine Ganzzahl",
                            name
                        )))
                    }
                },
                serde_json::Value::String(s) => PropertyValue::Text(s.clone()),
                andere => {
                    return Err(McpError::UngueltigerParameter(format!(
                        "'{}' hat nicht unterstuetzten JSON-Typ: {}",
                        name, andere
                    )))
                }
            };
            property.wert_setzen(wert)?;
        }
    }

    Ok(liste)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

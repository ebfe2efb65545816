//! Rueckgabewerte von Werkzeug-Aufrufen
//!
//! Ein `ReturnValue` wird nach dem Handler-Aufruf in das MCP-Ergebnisformat
//! serialisiert: ein `content`-Array plus `isError`-Flag.

use base64::Engine as _;

/// Getaggter Rueckgabewert eines Werkzeug-Handlers
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Json(serde_json::Value),
    /// Bild als MIME-Typ + Base64-Daten
    Image {
        mime: String,
        daten: String,
    },
}

impl ReturnValue {
    /// Erstellt einen Bild-Wert aus rohen Bytes (Base64-kodiert)
    pub fn image_aus_bytes(mime: impl Into<String>, bytes: &[u8]) -> Self {
        Self::Image {
            mime: mime.into(),
            daten: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Serialisiert den Wert als `tools/call`-Ergebnis
    ///
    /// Textuelle Varianten landen als `{"type":"text","text":...}`,
    /// Bilder als `{"type":"image","mimeType":...,"data":...}`.
    pub fn als_ergebnis(&self) -> serde_json::Value {
        let inhalt = match self {
            ReturnValue::Bool(b) => serde_json::json!([{
                "type": "text",
                "text": if *b { "true" } else { "false" },
            }]),
            ReturnValue::Int(i) => serde_json::json!([{
                "type": "text",
                "text": i.to_string(),
            }]),
            ReturnValue::Text(s) => serde_json::json!([{
                "type": "text",
                "text": s,
            }]),
            ReturnValue::Json(v) => serde_json::json!([{
                "type": "text",
                "text": v.to_string(),
            }]),
            ReturnValue::Image { mime, daten } => serde_json::json!([{
                "type": "image",
                "mimeType": mime,
                "data": daten,
            }]),
        };
        serde_json::json!({
            "content": inhalt,
            "isError": false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_als_text() {
        let ergebnis = ReturnValue::Bool(true).als_ergebnis();
        assert_eq!(ergebnis["content"][0]["type"], "text");
        assert_eq!(ergebnis["content"][0]["text"], "true");
        assert_eq!(ergebnis["isError"], false);

        let ergebnis = ReturnValue::Bool(false).als_ergebnis();
        assert_eq!(ergebnis["content"][0]["text"], "false");
    }

    #[test]
    fn int_als_dezimal() {
        let ergebnis = ReturnValue::Int(-42).als_ergebnis();
        assert_eq!(ergebnis["content"][0]["text"], "-42");
    }

    #[test]
    fn text_woertlich() {
        let ergebnis = ReturnValue::Text("Hallo Welt".into()).als_ergebnis();
        assert_eq!(ergebnis["content"][0]["text"], "Hallo Welt");
    }

    #[test]
    fn json_als_serialisierter_text() {
        let ergebnis = ReturnValue::Json(serde_json::json!({"a": 1})).als_ergebnis();
        assert_eq!(ergebnis["content"][0]["text"], r#"{"a":1}"#);
    }

    #[test]
    fn bild_mit_mime_und_daten() {
        let ergebnis = ReturnValue::image_aus_bytes("image/png", &[1, 2, 3]).als_ergebnis();
        assert_eq!(ergebnis["content"][0]["type"], "image");
        assert_eq!(ergebnis["content"][0]["mimeType"], "image/png");
        assert_eq!(ergebnis["content"][0]["data"], "AQID");
        assert_eq!(ergebnis["isError"], false);
    }
}

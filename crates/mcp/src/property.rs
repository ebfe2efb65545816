//! Typisierte Eigenschaften fuer Werkzeug-Argumente
//!
//! Eine `Property` beschreibt ein benanntes, typisiertes Argument
//! (boolean, integer mit optionalem Bereich, string) mit optionalem
//! Standardwert. Eine `PropertyList` traegt sowohl die Deklaration der
//! Werkzeug-Parameter als auch die Argumente eines konkreten Aufrufs.

use crate::error::{McpError, McpResult};

/// Maximale Laenge eines Eigenschafts-Namens (Name < 256)
pub const MAX_NAME_LAENGE: usize = 255;

/// Maximale Anzahl Eigenschaften pro Liste
pub const MAX_EIGENSCHAFTEN: usize = 32;

// ---------------------------------------------------------------------------
// PropertyTyp / PropertyValue
// ---------------------------------------------------------------------------

/// Deklarierter Typ einer Eigenschaft
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyTyp {
    Boolean,
    /// Ganzzahl mit optionalem erlaubten Bereich
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    Text,
}

/// Konkreter Wert einer Eigenschaft
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Text(String),
}

impl PropertyValue {
    fn passt_zu(&self, typ: &PropertyTyp) -> bool {
        matches!(
            (self, typ),
            (PropertyValue::Boolean(_), PropertyTyp::Boolean)
                | (PropertyValue::Integer(_), PropertyTyp::Integer { .. })
                | (PropertyValue::Text(_), PropertyTyp::Text)
        )
    }
}

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

/// Benannte, typisierte Eigenschaft mit optionalem Wert
#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    typ: PropertyTyp,
    wert: Option<PropertyValue>,
}

impl Property {
    fn name_pruefen(name: &str) -> McpResult<()> {
        if name.is_empty() {
            return Err(McpError::NameUngueltig("Name darf nicht leer sein".into()));
        }
        if name.len() > MAX_NAME_LAENGE {
            return Err(McpError::NameUngueltig(format!(
                "Name zu lang: {} Zeichen (Maximum {})",
                name.len(),
                MAX_NAME_LAENGE
            )));
        }
        Ok(())
    }

    /// Boolean-Eigenschaft mit optionalem Standardwert
    pub fn boolean(name: impl Into<String>, standard: Option<bool>) -> McpResult<Self> {
        let name = name.into();
        Self::name_pruefen(&name)?;
        Ok(Self {
            name,
            typ: PropertyTyp::Boolean,
            wert: standard.map(PropertyValue::Boolean),
        })
    }

    /// Integer-Eigenschaft mit optionalem Bereich und Standardwert
    pub fn integer(
        name: impl Into<String>,
        min: Option<i64>,
        max: Option<i64>,
        standard: Option<i64>,
    ) -> McpResult<Self> {
        let name = name.into();
        Self::name_pruefen(&name)?;
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(McpError::UngueltigerParameter(format!(
                    "Bereich ungueltig: min {} > max {}",
                    min, max
                )));
            }
        }
        let mut property = Self {
            name,
            typ: PropertyTyp::Integer { min, max },
            wert: None,
        };
        if let Some(wert) = standard {
            property.wert_setzen(PropertyValue::Integer(wert))?;
        }
        Ok(property)
    }

    /// Text-Eigenschaft mit optionalem Standardwert
    pub fn text(name: impl Into<String>, standard: Option<String>) -> McpResult<Self> {
        let name = name.into();
        Self::name_pruefen(&name)?;
        Ok(Self {
            name,
            typ: PropertyTyp::Text,
            wert: standard.map(PropertyValue::Text),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn typ(&self) -> &PropertyTyp {
        &self.typ
    }

    /// Aktueller Wert (Argument oder Standardwert)
    pub fn wert(&self) -> Option<&PropertyValue> {
        self.wert.as_ref()
    }

    /// Eigenschaft ohne Standardwert gilt als erforderlich
    pub fn ist_erforderlich(&self) -> bool {
        self.wert.is_none()
    }

    /// Setzt den Wert; prueft Typ und Integer-Bereich
    pub fn wert_setzen(&mut self, wert: PropertyValue) -> McpResult<()> {
        if !wert.passt_zu(&self.typ) {
            return Err(McpError::UngueltigerParameter(format!(
                "Typ passt nicht zu '{}'",
                self.name
            )));
        }
        if let (PropertyValue::Integer(w), PropertyTyp::Integer { min, max }) = (&wert, &self.typ) {
            if let Some(min) = min {
                if w < min {
                    return Err(McpError::UngueltigerParameter(format!(
                        "'{}' = {} unterschreitet Minimum {}",
                        self.name, w, min
                    )));
                }
            }
            if let Some(max) = max {
                if w > max {
                    return Err(McpError::UngueltigerParameter(format!(
                        "'{}' = {} ueberschreitet Maximum {}",
                        self.name, w, max
                    )));
                }
            }
        }
        self.wert = Some(wert);
        Ok(())
    }

    pub fn als_bool(&self) -> Option<bool> {
        match self.wert {
            Some(PropertyValue::Boolean(b)) => Some(b),
            _ => None,
        }
    }

    pub fn als_i64(&self) -> Option<i64> {
        match self.wert {
            Some(PropertyValue::Integer(i)) => Some(i),
            _ => None,
        }
    }

    pub fn als_str(&self) -> Option<&str> {
        match &self.wert {
            Some(PropertyValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// JSON-Schema-Fragment fuer `tools/list`
    pub fn json_schema(&self) -> serde_json::Value {
        match &self.typ {
            PropertyTyp::Boolean => serde_json::json!({"type": "boolean"}),
            PropertyTyp::Integer { min, max } => {
                let mut schema = serde_json::json!({"type": "integer"});
                if let Some(min) = min {
                    schema["minimum"] = serde_json::json!(min);
                }
                if let Some(max) = max {
                    schema["maximum"] = serde_json::json!(max);
                }
                schema
            }
            PropertyTyp::Text => serde_json::json!({"type": "string"}),
        }
    }
}

// ---------------------------------------------------------------------------
// PropertyList
// ---------------------------------------------------------------------------

/// Geordnete Sammlung von Eigenschaften, eindeutig nach Name
#[derive(Debug, Clone, Default)]
pub struct PropertyList {
    eintraege: Vec<Property>,
}

impl PropertyList {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Fuegt eine Eigenschaft hinzu
    ///
    /// # Fehler
    /// - `BereitsVorhanden` bei doppeltem Namen
    /// - `RessourcenLimit` wenn die Liste voll ist
    pub fn hinzufuegen(&mut self, property: Property) -> McpResult<()> {
        if self.eintraege.len() >= MAX_EIGENSCHAFTEN {
            return Err(McpError::RessourcenLimit(format!(
                "Maximal {} Eigenschaften",
                MAX_EIGENSCHAFTEN
            )));
        }
        if self.finden(property.name()).is_some() {
            return Err(McpError::BereitsVorhanden(property.name().to_string()));
        }
        self.eintraege.push(property);
        Ok(())
    }

    /// Sucht eine Eigenschaft anhand ihres Namens
    pub fn finden(&self, name: &str) -> Option<&Property> {
        self.eintraege.iter().find(|p| p.name() == name)
    }

    /// Veraenderlicher Zugriff anhand des Namens
    pub fn finden_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.eintraege.iter_mut().find(|p| p.name() == name)
    }

    pub fn laenge(&self) -> usize {
        self.eintraege.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.eintraege.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.eintraege.iter()
    }

    /// JSON-Schema-Objekt fuer `tools/list` (`inputSchema`)
    pub fn json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for property in &self.eintraege {
            properties.insert(property.name().to_string(), property.json_schema());
            if property.ist_erforderlich() {
                required.push(serde_json::json!(property.name()));
            }
        }
        let mut schema = serde_json::json!({
            "type": "object",
            "properties": properties,
        });
        if !required.is_empty() {
            schema["required"] = serde_json::Value::Array(required);
        }
        schema
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_mit_standardwert() {
        let p = Property::boolean("aktiv", Some(true)).unwrap();
        assert_eq!(p.als_bool(), Some(true));
        assert!(!p.ist_erforderlich());
    }

    #[test]
    fn text_ohne_standardwert_ist_erforderlich() {
        let p = Property::text("nachricht", None).unwrap();
        assert!(p.ist_erforderlich());
        assert_eq!(p.als_str(), None);
    }

    #[test]
    fn integer_bereich_wird_geprueft() {
        let mut p = Property::integer("lautstaerke", Some(0), Some(100), None).unwrap();
        assert!(p.wert_setzen(PropertyValue::Integer(50)).is_ok());
        assert!(p.wert_setzen(PropertyValue::Integer(101)).is_err());
        assert!(p.wert_setzen(PropertyValue::Integer(-1)).is_err());
        // Der letzte gueltige Wert bleibt erhalten
        assert_eq!(p.als_i64(), Some(50));
    }

    #[test]
    fn integer_standardwert_muss_im_bereich_liegen() {
        assert!(Property::integer("n", Some(0), Some(10), Some(11)).is_err());
        assert!(Property::integer("n", Some(0), Some(10), Some(10)).is_ok());
    }

    #[test]
    fn integer_ungueltiger_bereich() {
        assert!(Property::integer("n", Some(10), Some(0), None).is_err());
    }

    #[test]
    fn falscher_typ_wird_abgelehnt() {
        let mut p = Property::boolean("aktiv", None).unwrap();
        assert!(p.wert_setzen(PropertyValue::Text("ja".into())).is_err());
    }

    #[test]
    fn name_grenzen() {
        assert!(Property::text("", None).is_err());
        assert!(Property::text("x".repeat(255), None).is_ok());
        assert!(Property::text("x".repeat(256), None).is_err());
    }

    #[test]
    fn liste_eindeutige_namen() {
        let mut liste = PropertyList::neu();
        liste.hinzufuegen(Property::text("a", None).unwrap()).unwrap();
        let doppelt = liste.hinzufuegen(Property::text("a", None).unwrap());
        assert!(matches!(doppelt, Err(McpError::BereitsVorhanden(_))));
        assert_eq!(liste.laenge(), 1);
    }

    #[test]
    fn liste_limit() {
        let mut liste = PropertyList::neu();
        for i in 0..MAX_EIGENSCHAFTEN {
            liste
                .hinzufuegen(Property::text(format!("p{}", i), None).unwrap())
                .unwrap();
        }
        let zu_viel = liste.hinzufuegen(Property::text("extra", None).unwrap());
        assert!(matches!(zu_viel, Err(McpError::RessourcenLimit(_))));
    }

    #[test]
    fn json_schema_integer_mit_bereich() {
        let p = Property::integer("anzahl", Some(1), Some(8), None).unwrap();
        let schema = p.json_schema();
        assert_eq!(schema["type"], "integer");
        assert_eq!(schema["minimum"], 1);
        assert_eq!(schema["maximum"], 8);
    }

    #[test]
    fn json_schema_liste_mit_required() {
        let mut liste = PropertyList::neu();
        liste
            .hinzufuegen(Property::text("nachricht", None).unwrap())
            .unwrap();
        liste
            .hinzufuegen(Property::boolean("laut", Some(false)).unwrap())
            .unwrap();
        let schema = liste.json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["nachricht"]["type"], "string");
        assert_eq!(schema["required"], serde_json::json!(["nachricht"]));
    }
}

//! Binaeres Audio-Framing fuer WebSocket-Binaer-Frames
//!
//! Unterstuetzt zwei Header-Formate, ausgewaehlt ueber die konfigurierte
//! Protokollversion. Alle Mehrbyte-Felder sind big-endian.
//!
//! ## Version 2 (Header = 16 Bytes)
//!
//! ```text
//! Offset  Len  Beschreibung
//! ------  ---  -----------
//!  0       2   Version
//!  2       2   Typ (0 = Audio)
//!  4       4   Reserviert
//!  8       4   Zeitstempel in Millisekunden
//! 12       4   Nutzdaten-Laenge
//! 16+      N   Nutzdaten (Opus-Bytes)
//! ```
//!
//! ## Version 3 (Header = 4 Bytes)
//!
//! ```text
//!  0       1   Typ (0 = Audio)
//!  1       1   Reserviert
//!  2       2   Nutzdaten-Laenge
//!  4+      N   Nutzdaten (Opus-Bytes)
//! ```
//!
//! Version 3 traegt keinen Zeitstempel. Jede andere Version behandelt
//! Binaer-Frames in beide Richtungen als rohe Nutzdaten ohne Header.

use bytes::{BufMut, BytesMut};
use std::io;

/// Header-Groesse der Version 2 in Bytes
pub const V2_HEADER_GROESSE: usize = 16;

/// Header-Groesse der Version 3 in Bytes
pub const V3_HEADER_GROESSE: usize = 4;

/// Typ-Feld fuer Audio-Frames
pub const BINAER_TYP_AUDIO: u8 = 0;

// ---------------------------------------------------------------------------
// WireVersion
// ---------------------------------------------------------------------------

/// Binaer-Framing-Variante, abgeleitet aus der Protokollversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireVersion {
    /// Kein Header, rohe Nutzdaten (alle Versionen ausser 2 und 3)
    Raw,
    /// 16-Byte-Header mit Zeitstempel
    V2,
    /// 4-Byte-Header ohne Zeitstempel
    V3,
}

impl WireVersion {
    /// Leitet die Framing-Variante aus der Protokollversion ab
    pub fn aus_protokollversion(version: u8) -> Self {
        match version {
            2 => WireVersion::V2,
            3 => WireVersion::V3,
            _ => WireVersion::Raw,
        }
    }

    /// Header-Groesse dieser Variante in Bytes
    pub fn header_groesse(&self) -> usize {
        match self {
            WireVersion::Raw => 0,
            WireVersion::V2 => V2_HEADER_GROESSE,
            WireVersion::V3 => V3_HEADER_GROESSE,
        }
    }
}

// ---------------------------------------------------------------------------
// Deframing-Ergebnis
// ---------------------------------------------------------------------------

/// Ein ausgepackter Audio-Frame
///
/// `timestamp_ms` ist 0 wenn das Format keinen Zeitstempel traegt (V3, Raw).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmpfangenesAudio {
    pub timestamp_ms: u32,
    pub payload: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Einpacken
// ---------------------------------------------------------------------------

/// Verpackt Opus-Nutzdaten in einen Binaer-Frame der gegebenen Variante
///
/// # Fehler
/// - `InvalidInput` wenn die Nutzdaten nicht in das Laengenfeld passen
pub fn audio_einpacken(
    version: WireVersion,
    timestamp_ms: u32,
    payload: &[u8],
) -> io::Result<Vec<u8>> {
    match version {
        WireVersion::Raw => Ok(payload.to_vec()),
        WireVersion::V2 => {
            if payload.len() > u32::MAX as usize {
                return Err(zu_gross(payload.len()));
            }
            let mut buf = BytesMut::with_capacity(V2_HEADER_GROESSE + payload.len());
            buf.put_u16(2);
            buf.put_u16(BINAER_TYP_AUDIO as u16);
            buf.put_u32(0); // reserviert
            buf.put_u32(timestamp_ms);
            buf.put_u32(payload.len() as u32);
            buf.put_slice(payload);
            Ok(buf.to_vec())
        }
        WireVersion::V3 => {
            if payload.len() > u16::MAX as usize {
                return Err(zu_gross(payload.len()));
            }
            let mut buf = BytesMut::with_capacity(V3_HEADER_GROESSE + payload.len());
            buf.put_u8(BINAER_TYP_AUDIO);
            buf.put_u8(0); // reserviert
            buf.put_u16(payload.len() as u16);
            buf.put_slice(payload);
            Ok(buf.to_vec())
        }
    }
}

// ---------------------------------------------------------------------------
// Auspacken
// ---------------------------------------------------------------------------

/// Packt einen empfangenen Binaer-Frame aus
///
/// Gibt `Ok(None)` zurueck wenn das Typ-Feld kein Audio bezeichnet
/// (solche Frames werden ignoriert).
///
/// # Fehler
/// - `InvalidData` wenn der Frame kuerzer als der Header ist
/// - `InvalidData` wenn die deklarierte Nutzdaten-Laenge nicht mit der
///   tatsaechlichen Frame-Laenge uebereinstimmt
pub fn audio_auspacken(version: WireVersion, daten: &[u8]) -> io::Result<Option<EmpfangenesAudio>> {
    match version {
        WireVersion::Raw => Ok(Some(EmpfangenesAudio {
            timestamp_ms: 0,
            payload: daten.to_vec(),
        })),
        WireVersion::V2 => {
            if daten.len() < V2_HEADER_GROESSE {
                return Err(zu_kurz(daten.len(), V2_HEADER_GROESSE));
            }
            let typ = u16::from_be_bytes([daten[2], daten[3]]);
            if typ != BINAER_TYP_AUDIO as u16 {
                return Ok(None);
            }
            let timestamp_ms = u32::from_be_bytes([daten[8], daten[9], daten[10], daten[11]]);
            let laenge = u32::from_be_bytes([daten[12], daten[13], daten[14], daten[15]]) as usize;
            let nutzdaten = &daten[V2_HEADER_GROESSE..];
            if nutzdaten.len() != laenge {
                return Err(laenge_inkonsistent(laenge, nutzdaten.len()));
            }
            Ok(Some(EmpfangenesAudio {
                timestamp_ms,
                payload: nutzdaten.to_vec(),
            }))
        }
        WireVersion::V3 => {
            if daten.len() < V3_HEADER_GROESSE {
                return Err(zu_kurz(daten.len(), V3_HEADER_GROESSE));
            }
            if daten[0] != BINAER_TYP_AUDIO {
                return Ok(None);
            }
            let laenge = u16::from_be_bytes([daten[2], daten[3]]) as usize;
            let nutzdaten = &daten[V3_HEADER_GROESSE..];
            if nutzdaten.len() != laenge {
                return Err(laenge_inkonsistent(laenge, nutzdaten.len()));
            }
            Ok(Some(EmpfangenesAudio {
                timestamp_ms: 0,
                payload: nutzdaten.to_vec(),
            }))
        }
    }
}

// ---------------------------------------------------------------------------
// Fehler-Hilfsfunktionen
// ---------------------------------------------------------------------------

fn zu_kurz(ist: usize, erwartet: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Frame zu kurz: {} Bytes (Header erwartet {})", ist, erwartet),
    )
}

fn laenge_inkonsistent(deklariert: usize, tatsaechlich: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!(
            "Nutzdaten-Laenge inkonsistent: Header deklariert {}, Frame enthaelt {}",
            deklariert, tatsaechlich
        ),
    )
}

fn zu_gross(laenge: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("Nutzdaten zu gross fuer das Laengenfeld: {} Bytes", laenge),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_aus_protokollversion() {
        assert_eq!(WireVersion::aus_protokollversion(2), WireVersion::V2);
        assert_eq!(WireVersion::aus_protokollversion(3), WireVersion::V3);
        assert_eq!(WireVersion::aus_protokollversion(1), WireVersion::Raw);
        assert_eq!(WireVersion::aus_protokollversion(9), WireVersion::Raw);
    }

    #[test]
    fn v2_round_trip() {
        let payload = vec![0xAB; 120];
        let frame = audio_einpacken(WireVersion::V2, 123456, &payload).unwrap();
        assert_eq!(frame.len(), V2_HEADER_GROESSE + 120);

        let empfangen = audio_auspacken(WireVersion::V2, &frame)
            .unwrap()
            .expect("Audio-Frame erwartet");
        assert_eq!(empfangen.timestamp_ms, 123456);
        assert_eq!(empfangen.payload, payload);
    }

    #[test]
    fn v2_big_endian_byte_reihenfolge() {
        let frame = audio_einpacken(WireVersion::V2, 0x01020304, &[0xFF]).unwrap();
        // Version bei Offset 0-1
        assert_eq!(frame[0], 0x00);
        assert_eq!(frame[1], 0x02);
        // Typ bei Offset 2-3
        assert_eq!(frame[2], 0x00);
        assert_eq!(frame[3], 0x00);
        // Zeitstempel bei Offset 8-11
        assert_eq!(frame[8], 0x01);
        assert_eq!(frame[11], 0x04);
        // Laenge bei Offset 12-15
        assert_eq!(frame[15], 0x01);
    }

    #[test]
    fn v3_exakte_bytes() {
        // 200 Bytes Nutzdaten ergeben exakt 204 Bytes Frame
        let payload = vec![0x55; 200];
        let frame = audio_einpacken(WireVersion::V3, 0, &payload).unwrap();
        assert_eq!(frame.len(), 204);
        assert_eq!(frame[0], 0);
        assert_eq!(frame[1], 0);
        // 200 = 0x00C8 big-endian
        assert_eq!(frame[2], 0x00);
        assert_eq!(frame[3], 0xC8);
        assert_eq!(&frame[4..], &payload[..]);
    }

    #[test]
    fn v3_round_trip_ohne_zeitstempel() {
        let payload = vec![1, 2, 3, 4];
        // Der Zeitstempel geht bei V3 verloren
        let frame = audio_einpacken(WireVersion::V3, 99999, &payload).unwrap();
        let empfangen = audio_auspacken(WireVersion::V3, &frame)
            .unwrap()
            .expect("Audio-Frame erwartet");
        assert_eq!(empfangen.timestamp_ms, 0);
        assert_eq!(empfangen.payload, payload);
    }

    #[test]
    fn raw_ist_durchreichung() {
        let payload = vec![9, 8, 7];
        let frame = audio_einpacken(WireVersion::Raw, 42, &payload).unwrap();
        assert_eq!(frame, payload);

        let empfangen = audio_auspacken(WireVersion::Raw, &frame).unwrap().unwrap();
        assert_eq!(empfangen.timestamp_ms, 0);
        assert_eq!(empfangen.payload, payload);
    }

    #[test]
    fn v2_fremder_typ_wird_ignoriert() {
        let mut frame = audio_einpacken(WireVersion::V2, 0, &[1, 2, 3]).unwrap();
        frame[3] = 7; // Typ-Feld auf unbekannten Wert setzen
        let result = audio_auspacken(WireVersion::V2, &frame).unwrap();
        assert!(result.is_none(), "Nicht-Audio-Frames muessen ignoriert werden");
    }

    #[test]
    fn v3_fremder_typ_wird_ignoriert() {
        let mut frame = audio_einpacken(WireVersion::V3, 0, &[1, 2, 3]).unwrap();
        frame[0] = 1;
        let result = audio_auspacken(WireVersion::V3, &frame).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn v2_zu_kurzer_frame() {
        let result = audio_auspacken(WireVersion::V2, &[0u8; 8]);
        assert!(result.is_err());
    }

    #[test]
    fn v3_zu_kurzer_frame() {
        let result = audio_auspacken(WireVersion::V3, &[0u8; 2]);
        assert!(result.is_err());
    }

    #[test]
    fn v2_inkonsistente_laenge() {
        let mut frame = audio_einpacken(WireVersion::V2, 0, &[1, 2, 3, 4]).unwrap();
        // Laengenfeld manipulieren: deklariert 2, enthaelt 4
        frame[15] = 2;
        let result = audio_auspacken(WireVersion::V2, &frame);
        assert!(result.is_err());
    }

    #[test]
    fn v3_inkonsistente_laenge() {
        let mut frame = audio_einpacken(WireVersion::V3, 0, &[1, 2, 3, 4]).unwrap();
        frame[3] = 9;
        let result = audio_auspacken(WireVersion::V3, &frame);
        assert!(result.is_err());
    }

    #[test]
    fn v3_nutzdaten_limit() {
        let payload = vec![0u8; u16::MAX as usize + 1];
        assert!(audio_einpacken(WireVersion::V3, 0, &payload).is_err());
    }

    #[test]
    fn leere_nutzdaten_ok() {
        let frame = audio_einpacken(WireVersion::V3, 0, &[]).unwrap();
        assert_eq!(frame.len(), V3_HEADER_GROESSE);
        let empfangen = audio_auspacken(WireVersion::V3, &frame).unwrap().unwrap();
        assert!(empfangen.payload.is_empty());
    }
}

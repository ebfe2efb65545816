//! voicelink-client – Fassade und Ereignis-Verteilung
//!
//! Verdrahtet die Subsysteme zu einem nutzbaren SDK:
//! - Capture-Worker: liest PCM vom Geraet, kodiert, sendet ueber die Session
//! - Ereignis-Verteilung: uebersetzt Session-Ereignisse in den typisierten
//!   Ereignis-Strom und fuehrt die automatischen Hoer-/TTS-Ablaeufe aus
//! - `VoicelinkClient`: besitzt Geraet, Codec, Wiedergabe-Engine,
//!   Session-Engine und Tool-Server und steuert deren Lebenszyklus

pub mod capture;
pub mod client;
pub mod fanout;

pub use capture::{AudioVersand, CaptureWorker};
pub use client::VoicelinkClient;
pub use fanout::{EreignisFanout, EreignisSenke, FacadeZustand, Steuerkanal};

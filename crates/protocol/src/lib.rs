//! voicelink-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert die JSON-Steuernachrichten (Text-Frames) und
//! das binaere Audio-Framing (Binaer-Frames) die zwischen Client und
//! Dialog-Server ueber die WebSocket-Verbindung ausgetauscht werden.

pub mod control;
pub mod wire;

pub use control::{
    AbbruchGrund, AbortNachricht, ClientHello, ListenNachricht, McpNachricht, ServerHello,
    ServerNachricht, TtsPhase,
};
pub use wire::{audio_auspacken, audio_einpacken, EmpfangenesAudio, WireVersion};

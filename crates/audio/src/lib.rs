//! voicelink-audio – Audio-Engine
//!
//! Vollstaendige Audio-Schicht fuer Voicelink:
//! - Mutex/Condvar-geschuetzte Ring-Buffer (das einzige Puffer-Primitiv
//!   im Audio-Pfad)
//! - Vollduplex-Geraete-Abstraktion mit cpal-Backend und Stub-Backend
//! - Opus Encoding/Decoding via audiopus mit Stub-Variante fuer Tests
//! - Wiedergabe-Pipeline: Worker-Thread der eingehende Opus-Frames
//!   dekodiert und als PCM an das Geraet schreibt

pub mod codec;
pub mod cpal_backend;
pub mod device;
pub mod error;
pub mod playback;
pub mod ring_buffer;
pub mod stub_backend;

// Bequeme Re-Exporte der wichtigsten Typen
pub use codec::{AudioCodec, OpusCodec, OpusEinstellungen, SignalTyp, StubCodec};
pub use cpal_backend::CpalGeraet;
pub use device::{
    get_default_input, get_default_output, list_input_devices, list_output_devices, AudioGeraet,
    AudioGeraetInfo, GeraetKonfig,
};
pub use error::{AudioError, AudioResult};
pub use playback::{PlaybackEngine, WiedergabeKonfig, ZustandsCallback};
pub use ring_buffer::{RingBuffer, SyncRingBuffer};
pub use stub_backend::StubGeraet;

//! voicelink-session – Session-Protokoll-Engine
//!
//! Besitzt die WebSocket-Verbindung zum Dialog-Server: baut die
//! Upgrade-Anfrage mit den Auth-Headern, sendet das Client-Hello,
//! verarbeitet Server-Hello/Goodbye intern, rahmt ausgehendes Audio und
//! entrahmt eingehendes, und meldet alles Weitere als Ereignisse an die
//! Fassade. Die Engine verbindet sich nicht selbststaendig neu; nach
//! einem Transportfehler entscheidet der Aufrufer ueber Abbau und Neuaufbau.

pub mod engine;
pub mod error;
pub mod state;

pub use engine::{SessionBefehl, SessionConfig, SessionEngine, SessionEreignis, SessionHandle};
pub use error::{SessionError, SessionResult};
pub use state::{SessionZustand, LIVENESS_FENSTER};

//! voicelink-mcp – Eingebetteter Tool-Server (MCP)
//!
//! Ein prozess-lokaler JSON-RPC 2.0 Endpunkt ueber den das entfernte
//! Dialog-Modell lokale Faehigkeiten aufrufen kann. Der Server ist
//! passiv: er verarbeitet eine eingehende Nachricht nach der anderen
//! und antwortet ueber eine einzelne Sende-Senke die beim Start
//! uebergeben wird (im Zielsystem der Text-Kanal der Session-Engine).

pub mod error;
pub mod property;
pub mod server;
pub mod tool;
pub mod value;

pub use error::{McpError, McpResult};
pub use property::{Property, PropertyList, PropertyTyp, PropertyValue};
pub use server::{CapabilityCallback, McpServer, SendeSenke, MCP_PROTOKOLL_VERSION};
pub use tool::{Tool, ToolHandler};
pub use value::ReturnValue;

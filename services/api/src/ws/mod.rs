//! WebSocket Lesson Sessions
//!
//! Each WebSocket connection gets its own lesson session:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the connection lifecycle and bridges it to the session actor.

pub mod protocol;
pub mod session;

pub use session::ws_handler;

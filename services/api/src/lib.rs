//! Lesson API Library Crate
//!
//! This library contains the web service that plays lessons to browsers:
//! configuration, shared state, the course outline endpoint, the WebSocket
//! session bridge and routing. The `api` binary is a thin wrapper around it.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;

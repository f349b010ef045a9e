//! mixcast infrastructure: mixer backends and the WebSocket broadcast server

pub mod mixer;
pub mod server;

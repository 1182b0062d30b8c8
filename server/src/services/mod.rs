//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own membership and directory concerns so route handlers
//! can stay focused on protocol translation.

pub mod channel;
pub mod directory;

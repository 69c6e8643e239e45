//! Built-in bridges
//!
//! Bridges shipped with majakka. Backend-specific bridges live in their own
//! crates and depend on `majakka-core` only.

pub mod static_bridge;

pub use static_bridge::StaticBridge;

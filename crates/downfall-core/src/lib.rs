// Core types for the Downfall companion: wire types, the game-client command
// surface, the settings document, and shared errors.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;

pub use client::{ClientResult, GameClient};
pub use error::{ClientError, ConfigError};

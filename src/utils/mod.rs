//! Configuration utilities.

/// `agora.toml` loading, validation and the config manager.
pub mod toml_config;

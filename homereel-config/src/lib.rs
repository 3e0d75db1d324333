//! Shared configuration library for Homereel.
//!
//! This crate centralizes environment-variable loading and validation so the
//! server binary and any future tooling agree on defaults and required keys.
//! Values come from the process environment (the server loads a `.env` file
//! via dotenvy before asking for a [`Config`]).

pub mod loader;
pub mod models;

pub use loader::ConfigError;
pub use models::{
    Config, JellyfinConfig, MediaConfig, ServerConfig, UploadConfig,
};

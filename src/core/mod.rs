//! Configuration, settings, and the shared data model

pub mod config;
pub mod models;
pub mod settings;

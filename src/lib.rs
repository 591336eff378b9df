pub mod config;
pub mod engine;
pub mod geo;
pub mod kafka;
pub mod location;
pub mod models;
pub mod processor;

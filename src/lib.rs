pub mod adapters;
pub mod agent;
pub mod app;
mod assets;
pub mod client;
pub mod config;
pub mod error;
pub mod ports;
pub mod push;
pub mod state;
pub mod store;
pub mod types;
pub mod worker;

#[cfg(test)]
mod testing;

pub use app::{app, serve};
pub use error::{Error, Result};

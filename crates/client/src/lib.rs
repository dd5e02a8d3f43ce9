//! Timetable client: talks to the scheduling backend over HTTP, keeps a local
//! copy of the input entities and drives generation and export.

pub mod cache;
pub mod config;
pub mod export;
pub mod http;
pub mod render;
pub mod state;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use cache::{EntityCache, RefreshError};
pub use config::{ClientConfig, ConfigError};
pub use export::{default_filename, DirectorySink, ExportDispatcher};
pub use http::HttpBackend;
pub use state::AppState;

pub mod app;
pub mod cli;
pub mod compat;
pub mod config;
pub mod entry;
pub mod error;
pub mod external;
pub mod game;
pub mod log;
pub mod manifest;
pub mod registry;
pub mod signature;
pub mod task;

pub use app::{App, Control, LaunchMode};
pub use entry::ModEntry;
pub use error::ModError;
pub use registry::ModRegistry;
pub use signature::BuildSignature;

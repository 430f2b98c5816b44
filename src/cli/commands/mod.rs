//! Command implementations.

mod config;
mod doctor;
mod transcribe;

pub use config::run_config;
pub use doctor::run_doctor;
pub use transcribe::run_transcribe;

//! Configuration management for utskrift.

mod settings;

pub use settings::{
    GeneralSettings, OutputSettings, PipelineSettings, Settings, TranscriptionSettings,
};

//! Configuration module - layered settings for the studio

pub mod settings;

pub use settings::{
    GenerationConfig, LoggingConfig, PreparationConfig, Settings, SimulatorConfig, StorageConfig,
};

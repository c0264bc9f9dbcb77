pub mod error;
pub mod load;
pub mod settings;

pub use error::ConfigError;
pub use load::{load_engine_settings, load_request, load_workflow_definition};
pub use settings::{EngineSettings, RedactionSettings};

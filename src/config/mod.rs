//! Configuration module.
//!
//! Handles loading application settings and the analysis prompt.

mod prompts;
mod settings;

pub use prompts::AnalysisPrompt;
pub use settings::{
    AnalysisProvider, AnalysisSettings, DownloadSettings, Environment, GeneralSettings,
    SchedulerSettings, ServerSettings, Settings, StoreSettings,
};

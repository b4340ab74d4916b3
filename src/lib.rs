//! Sermon Analysis
//!
//! A worker that turns recorded sermons into study material. Sermons are
//! registered with an audio URL; each pass downloads the audio, sends it to a
//! generative AI provider and stores the summary, sermon notes and discussion
//! questions it returns.
//!
//! # Architecture
//!
//! - `config` - Settings and the analysis prompt
//! - `models` - Sermon, job, note and question records
//! - `store` - Sermon store abstraction and SQLite implementation
//! - `audio` - Audio download to a temporary file
//! - `analysis` - Provider backends, response parsing and the per-job analyzer
//! - `orchestrator` - One analysis pass over all created sermons
//! - `scheduler` - Periodic passes with cancellation
//! - `server` - Status HTTP endpoints
//!
//! Each sermon moves `created -> pending -> complete | error`, and a sermon
//! that has left `created` is never picked up again.
//!
//! # Example
//!
//! ```rust,no_run
//! use sermon_analysis::config::Settings;
//! use sermon_analysis::orchestrator::Orchestrator;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(&settings)?;
//!
//!     let report = orchestrator.run_pass(&CancellationToken::new()).await;
//!     println!("{} complete, {} failed", report.completed, report.failed);
//!
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod scheduler;
pub mod server;
pub mod store;

pub use error::{Result, SermonError};

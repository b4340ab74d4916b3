//! CLI command implementations.

mod config;
mod doctor;
mod list;
mod reset;
mod run_once;
mod serve;
mod show;
mod submit;

pub use config::run_config;
pub use doctor::run_doctor;
pub use list::run_list;
pub use reset::run_reset;
pub use run_once::run_once;
pub use serve::run_serve;
pub use show::run_show;
pub use submit::run_submit;

use crate::config::Settings;
use crate::store::SqliteSermonStore;

/// Open the configured sermon store.
fn open_store(settings: &Settings) -> crate::error::Result<SqliteSermonStore> {
    SqliteSermonStore::new(&settings.sqlite_path())
}

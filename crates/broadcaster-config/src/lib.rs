//! Configuration for the broadcaster session core.
//!
//! - [`ConfigStore`]: section/key settings with defaults and safe save
//! - [`ServiceDocument`]: the persisted streaming destination
//! - [`paths`]: recording filename templating and uniqueness helpers

mod defaults;
mod document;
mod error;
pub mod paths;
mod store;

pub use defaults::{register_basic_defaults, DEFAULT_FILENAME_FORMAT};
pub use document::ServiceDocument;
pub use error::{ConfigError, ConfigResult};
pub use store::ConfigStore;

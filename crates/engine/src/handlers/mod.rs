//! Built-in event handlers, selectable per rule by action name.

pub mod cli;
pub mod file_save;
pub mod index;
pub mod log;
pub mod notify;

pub use cli::{CliOutcome, CliRunner};
pub use file_save::FileSaveHandler;
pub use index::{IndexEntry, SearchIndex};
pub use log::LogHandler;
pub use notify::NotifyHandler;

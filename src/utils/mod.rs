pub mod db;
pub mod error;
pub mod format;
pub mod logging;
pub mod sql;
pub mod time;

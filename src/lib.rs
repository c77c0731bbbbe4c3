pub mod catalog;
pub mod config;
pub mod datanodes;
pub mod error;
pub mod executor;
pub mod models;
pub mod services;
pub mod sql;

pub use error::{ControllerError, SqlApiError, SqlResult};
pub use executor::{ExecuteCommands, SessionJobRunner};
pub use models::{ExecuteAnswer, TabularResult};
pub use services::{ControllerSet, SessionController};

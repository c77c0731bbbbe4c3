pub mod answer;
pub mod entities;
pub mod integration;
pub mod ml_model;
pub mod project;

pub use answer::*;
pub use entities::*;
pub use integration::*;
pub use ml_model::*;
pub use project::*;

use chrono::{DateTime, Utc};

/// Timestamp layout used in catalog rows
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

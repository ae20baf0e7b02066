pub mod agents;
pub mod config;
pub mod core;
pub mod detection;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod report;
pub mod supply;
pub mod util;
pub mod verification;

pub use error::{Error, Result, StructuralError};

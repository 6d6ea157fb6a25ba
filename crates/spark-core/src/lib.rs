pub mod config;
pub mod error;
pub mod gate;
pub mod hook;
pub mod io;
pub mod lock;
pub mod paths;
pub mod phase;
pub mod queue;
pub mod runner;
pub mod task;
pub mod team;
pub mod types;
pub mod verify;

pub use error::{Result, SparkError};

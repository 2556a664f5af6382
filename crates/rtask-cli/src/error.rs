//! Error types for rtask-demo

use rtask::TaskError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemoError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] TaskError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub mod rules;
pub mod scanner;
pub mod merge;

pub use rules::*;
pub use scanner::*;
pub use merge::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Content could not be read: {0}")]
    ContentRead(String),
}

pub mod error;
pub mod experiments;
pub mod quiz;

pub use error::{FlockenError, Result};

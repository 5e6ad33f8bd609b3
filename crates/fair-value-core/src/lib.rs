pub mod entity;
pub mod error;
pub mod format;
pub mod types;

#[cfg(feature = "valuation")]
pub mod valuation;

#[cfg(feature = "history")]
pub mod history;

pub use entity::{BusinessEntity, Industry};
pub use error::FairValueError;
pub use types::*;

/// Standard result type for all fair-value operations
pub type FairValueResult<T> = Result<T, FairValueError>;

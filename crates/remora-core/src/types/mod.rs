//! Scalar wrapper types carried by [`Value`](crate::value::Value).
//!
//! Each wrapper owns exactly one wire scalar family and knows how to render
//! itself into the backend's textual wire form.

mod decimal;
mod guid;
mod timestamp;

pub use decimal::Decimal;
pub use guid::{Guid, GuidError};
pub use timestamp::{Timestamp, TimestampError};

pub mod bitio;
pub mod error;
pub mod time;

pub use error::{Error, Result};
pub use time::ClockInstant;

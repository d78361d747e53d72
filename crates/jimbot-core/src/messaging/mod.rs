//! Transport-agnostic message model and the outbound port.

pub mod port;
pub mod types;

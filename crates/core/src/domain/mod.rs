pub mod period;
pub mod supplier;

pub mod booking;
pub mod ids;
pub mod lifecycle;
pub mod sweep;

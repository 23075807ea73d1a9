//! Domain types for ScalpLab

pub mod bar;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::Bar;
pub use position::{OpenPosition, Side};
pub use signal::Signal;
pub use trade::{ClosedTrade, ExitReason};

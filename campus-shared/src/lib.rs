pub mod clock;
pub mod models;
pub mod pii;

pub use clock::{Clock, SystemClock};
pub use pii::Masked;

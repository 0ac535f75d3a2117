//! Arrival pipeline: merge trip updates with routes, order and window them, and
//! label each entry relative to the render-time clock.

mod eta;
mod merge;
mod window;

pub use eta::{compute_eta, delay_minutes, is_delayed};
pub use merge::{merge_arrivals, EnrichedArrival};
pub use window::{order_and_limit, DEFAULT_LIMIT};

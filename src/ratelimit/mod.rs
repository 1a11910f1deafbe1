//! Rate limiting logic and state management.

mod clock;
mod identifier;
mod limiter;
mod log;
mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use identifier::Identifier;
pub use limiter::{Admission, Limits, RateLimiter, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS};
pub use log::RequestLog;
pub use sweeper::spawn_sweeper;

//! One-time code workflow: issuance with cooldown, delivery, and consumption.

pub mod clock;
pub mod code;
pub mod service;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use service::{Environment, IssueOutcome, OtpConfig, OtpError, OtpService};
pub use sweeper::spawn_code_sweeper;

//! Policy layer (glob filters, flow quotas, per-action rules).
//!
//! Compiles robot router parameters into lookup structures that the robot
//! router evaluates on every call.

pub mod actions;
pub mod glob;
pub mod limiter;

pub use actions::{ArchivePolicy, ArtifactCollectorPolicy, FileFinderPolicy, SimpleActionPolicy};
pub use self::glob::{GlobFilter, GlobVerdict};
pub use limiter::{Clock, ManualClock, QuotaLimits, RateLimitKey, RateLimiter, SystemClock};

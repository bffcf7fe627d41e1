//! API router implementations.

pub mod robot;
pub mod simple;

pub use robot::RobotRouter;
pub use simple::{DisabledRouter, UnrestrictedRouter};

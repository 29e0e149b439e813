//! # Core Utilities
//!
//! Building blocks shared by every domain service:
//!
//! - `timeout`: uniform deadline and poll-until-condition helpers
//! - `capabilities`: reconciles what a source can deliver with what a caller
//!   needs

pub mod capabilities;
pub mod timeout;

pub use capabilities::{calculate_field_requirements, ensure_supported, mandatory_fields};
pub use timeout::{wait_until, with_timeout, TimeoutGuard};

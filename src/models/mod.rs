//! Data models for the ALS Update Wiki.
//!
//! These models match the frontend TypeScript interfaces exactly for seamless interoperability.

mod extraction;
mod snapshot;
mod update;

pub use extraction::*;
pub use snapshot::*;
pub use update::*;

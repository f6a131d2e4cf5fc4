//! Application layer containing the core business logic orchestration.
//!
//! `LifecycleEngine` owns the order state machine and acceptance arbitration,
//! `RatingService` owns ratings and reputation, and `Marketplace` dispatches
//! typed commands to both over shared, concurrently accessed stores.

pub mod engine;
pub mod marketplace;
pub mod rating;

//! Domain model of the order marketplace: identities, orders, applications,
//! ratings, lifecycle events, and the storage ports the engine depends on.

pub mod applicant;
pub mod event;
pub mod identity;
pub mod order;
pub mod ports;
pub mod rating;

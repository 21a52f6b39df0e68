//! Service layer for business logic.

pub mod compass;

pub use compass::CompassService;

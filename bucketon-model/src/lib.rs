//! Record model for bucketon.
//!
//! Defines what the bucketing engine needs from the objects it groups:
//! - [`Record`] — named attribute access plus the "is this a recognized
//!   record" predicate checked before any bucketing starts
//! - [`Entity`] — the generic record (id, type, JSON payload, timestamps)
//!
//! Any domain type can be bucketed by implementing [`Record`]; `Entity` is the
//! implementation used by the JSON entry points and the behavior registry.

mod entity;
mod record;

pub use entity::Entity;
pub use record::Record;

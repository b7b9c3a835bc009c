//! Entity model shared by schema initialization and repositories.
//!
//! # Responsibility
//! - Define the `Entity` contract application records implement.
//! - Keep an explicit registry of entities per database.
//!
//! # Invariants
//! - Entities are registered explicitly; nothing is discovered reflectively.

pub mod entity;
pub mod registry;

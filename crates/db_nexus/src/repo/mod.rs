//! Repository layer over registered entities.
//!
//! # Responsibility
//! - Offer one generic CRUD surface for every entity type.
//! - Keep SQL text inside the persistence boundary.
//!
//! # Invariants
//! - Repositories receive the `Session` per call and hold no transactional
//!   state.
//! - Missing records surface as `RecordNotFoundError`, never as `None`.

pub mod repository;

//! Foundation types for the Amber object-persistence engine.
//!
//! This crate provides the identity and lifecycle types used throughout the
//! Amber system. Every other Amber crate depends on `amber-types`.
//!
//! # Key Types
//!
//! - [`Oid`] — Object identifier, unique within one storage handle
//! - [`ObjectState`] — Lifecycle state of a persistent object
//! - [`TypeError`] — Errors from parsing and converting foundation types

pub mod error;
pub mod oid;
pub mod state;

pub use error::TypeError;
pub use oid::Oid;
pub use state::ObjectState;

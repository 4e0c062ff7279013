//! `lotkeeper-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, optimistic version expectations and the
//! entity/value-object marker traits.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;
pub mod version;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{LotId, ProductId};
pub use value_object::ValueObject;
pub use version::ExpectedVersion;

//! `clinicrx-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the inventory, order and
//! billing crates (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod money;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{BatchId, SupplierId};
pub use money::{Money, Percent};

//! Entity metadata: field pipelines, key roles, relations and the registry.
//!
//! - `field` and `pipeline` define *how one attribute behaves*
//! - `entity` and `relation` define *what one entity type is*
//! - `registry` owns the set of declared entity types

pub mod builtin;
pub mod entity;
pub mod field;
pub mod pipeline;
pub mod registry;
pub mod relation;

//! Object-document mapper for partition/sort-key document stores: entity
//! metadata and attribute pipelines, a filter compiler, relation loading,
//! soft deletion and bounded transactions over a pluggable async driver.

#[macro_use]
mod macros;

// public exports are one module level down
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod model;
pub mod obs;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

pub use error::Error;

///
/// CONSTANTS
///

pub use config::{DEFAULT_TRANSACTION_LIMIT, MAX_TRANSACTION_LIMIT};

///
/// Prelude
///
/// Declaration vocabulary and the query surface.
/// Drivers, metrics and errors beyond [`Error`] are imported explicitly.
///

pub mod prelude {
    pub use crate::{
        db::{
            Db,
            query::{Condition, Filter, Include, IncludeSpec, Operator, Order, Query, QueryOptions},
        },
        entity::{Entity, Related},
        error::Error,
        model::{
            builtin,
            entity::EntityModel,
            field::FieldModel,
            registry::MetadataRegistry,
            relation::RelationModel,
        },
        record,
        value::{Record, Value},
    };
}

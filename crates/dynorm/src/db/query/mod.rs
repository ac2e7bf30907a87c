//! Declarative filters and their translation into store operations.

mod compile;
mod eval;
mod expression;
mod filter;
mod options;


// re-exports
pub use compile::{AccessMode, AccessPath, CompiledQuery, KeyCondition, compile};
pub use eval::{matches, matches_all};
pub use expression::Expression;
pub use filter::{Condition, Filter, IntoFilter, Operator};
pub use options::{Include, IncludeSpec, Order, Query, QueryOptions, TrashedMode};

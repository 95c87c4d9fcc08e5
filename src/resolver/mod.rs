//! Resolver table
//!
//! Maps (type, field) pairs to resolver capabilities. Fields without a
//! registered resolver read the matching key of their parent value.

pub mod context;
pub mod table;

pub use context::{AppData, Arguments, ResolverContext};
pub use table::{DefaultPropertyResolver, FnResolver, Resolver, ResolverTable, TypeResolver};

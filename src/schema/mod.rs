//! Schema registry
//!
//! Holds the type definitions an operation is executed against. Built
//! once, from a flattened type collection or from SDL, and immutable
//! afterwards.

pub mod registry;
pub mod sdl;
pub mod types;

pub use registry::{RootTypes, SchemaRegistry};
pub use sdl::type_collection_from_sdl;
pub use types::{
    BUILTIN_SCALARS, EnumType, FieldDef, InputObjectType, InputValueDef, InterfaceType,
    ObjectType, ScalarType, TypeDef, TypeRef,
};

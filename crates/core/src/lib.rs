#![forbid(unsafe_code)]

pub mod hash;
pub mod ids;
pub mod json_patch;
pub mod migration;
pub mod path;
pub mod schema;
pub mod time;
pub mod value_store;

pub use hash::hash_json;
pub use ids::{IdError, RowId, TableId, generate_id};
pub use json_patch::{JsonPatch, JsonPatchError, apply_json_patches};
pub use migration::{ChangeType, Migration, MigrationError, MigrationReport, MigrationStatus};
pub use path::{DataPath, PathError, PathSegment};
pub use schema::{
    ForeignKeyField, NoRefs, SchemaError, SchemaKind, SchemaNode, SchemaResolver, ValidationIssue,
    compile_schema,
};
pub use value_store::{PatchError, RowPatch, ValueNode, ValueStore, create_value_store, to_patches};

#[cfg(test)]
mod tests;

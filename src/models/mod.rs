//! Data models.
//!
//! Values, records and the table schemas that stand in for runtime field
//! reflection.

mod record;
mod schema;
mod value;

pub use record::Record;
pub use schema::{FieldDef, FieldKind, ID_FIELD, NAME_FIELD, TableSchema};
pub use value::Value;

//! Model trait for struct-to-row mapping.
//!
//! The `Model` trait defines the contract for structs that can be stored as
//! rows of a table. It is typically derived using `#[derive(Model)]` from
//! `tempcopy-macros`.

use crate::Result;
use crate::field::FieldInfo;
use crate::identifier::Identifier;
use crate::row::Row;
use crate::schema::IdentityKind;
use crate::value::Value;

/// Trait for types that can be stored as table rows.
///
/// # Example
///
/// ```ignore
/// use tempcopy::Model;
///
/// #[derive(Model)]
/// #[tempcopy(table = "Person", identity = "int")]
/// struct Person {
///     #[tempcopy(primary_key, column = "Id")]
///     id: Option<i64>,
///     #[tempcopy(column = "Version")]
///     version: Option<Vec<u8>>,
///     #[tempcopy(column = "Name")]
///     name: String,
/// }
/// ```
pub trait Model: Sized + Send + Sync {
    /// Default table name for this model.
    const TABLE_NAME: &'static str;

    /// Column holding the row identifier.
    const PRIMARY_KEY: &'static str;

    /// How identifiers are produced for rows that do not carry one.
    const IDENTITY: IdentityKind = IdentityKind::Supplied;

    /// Field metadata for all columns, in column order.
    fn fields() -> &'static [FieldInfo];

    /// Convert this instance to `(column, value)` pairs.
    fn to_row(&self) -> Vec<(&'static str, Value)>;

    /// Construct an instance from a stored row.
    fn from_row(row: &Row) -> Result<Self>;

    /// The identifier currently held, if any.
    fn identifier(&self) -> Option<Identifier>;

    /// Store an assigned identifier into the key field.
    fn set_identifier(&mut self, id: Identifier) -> Result<()>;

    /// Whether this instance has never been assigned an identifier.
    fn is_new(&self) -> bool {
        self.identifier().is_none()
    }
}

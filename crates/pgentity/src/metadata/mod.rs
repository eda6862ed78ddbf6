//! Model metadata consumed by the engine.
//!
//! The declaration layer (attributes, reflection, inheritance merging) lives
//! outside this crate; it hands over a finished [`Registry`] whose models
//! already carry a flat, reconciled column list.
//!
//! ```ignore
//! use pgentity::metadata::{ColumnMetadata, ColumnType, ModelMetadata, Registry};
//!
//! let mut registry = Registry::new();
//! registry.register(
//!     ModelMetadata::new("Product", "products")
//!         .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary())
//!         .with_column(ColumnMetadata::plain("name", ColumnType::String).required())
//!         .with_column(ColumnMetadata::belongs_to("store", "Store").name("store_id")),
//! )?;
//! ```

mod column;
mod model;
mod registry;


pub use column::{ColumnKind, ColumnMetadata, ColumnType, DefaultValue, ModelRef};
pub use model::ModelMetadata;
pub use registry::Registry;

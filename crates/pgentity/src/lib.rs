//! # pgentity
//!
//! A metadata-driven PostgreSQL entity engine.
//!
//! ## Features
//!
//! - **Metadata first**: models are described once ([`ModelMetadata`]) and registered
//!   in a [`Registry`]
//! - **Deferred builders**: `find`, `find_one`, `count`, `create`, `update` and
//!   `destroy` chain freely and run when awaited
//! - **Predicates**: a fluent [`WhereQuery`] builder or loose JSON
//!   (`{"price": {"<": 10}}`), compiled to parameterized SQL
//! - **Population**: belongs-to, has-many and many-to-many relations, one batched
//!   query per relation
//! - **Hydration**: rows become [`Entity<M>`] values; behaviour is attached with
//!   traits on `Entity<M>`
//! - **Shared execution**: `.shared()` lets any number of awaiters observe one statement
//!
//! ```ignore
//! use pgentity::prelude::*;
//!
//! struct Product;
//! impl Model for Product {
//!     const NAME: &'static str = "Product";
//! }
//!
//! let registry = Registry::new()
//!     .with(ModelMetadata::new("Store", "stores")
//!         .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary()))?
//!     .with(ModelMetadata::new("Product", "products")
//!         .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary())
//!         .with_column(ColumnMetadata::plain("name", ColumnType::String))
//!         .with_column(ColumnMetadata::belongs_to("store", "Store").name("store_id")))?;
//!
//! let pool = create_pool(&std::env::var("DATABASE_URL")?)?;
//! let orm = Orm::initialize(registry, OrmConfig::new(Arc::new(pool)))?;
//! let products = orm.repository::<Product>()?;
//!
//! let shoes = products
//!     .find()
//!     .where_json(json!({ "name": { "like": "%shoe%" } }))
//!     .sort("name")
//!     .populate("store")
//!     .await?;
//! ```

mod config;
mod driver;
pub mod error;
mod hydrate;
pub mod ident;
mod log;
pub mod metadata;
mod model;
pub mod pool;
mod populate;
pub mod predicate;
pub mod prelude;
pub mod query;
mod record;
mod repository;
pub mod sort;
pub mod sql;

pub use config::{Connection, OrmConfig};
pub use error::{OrmError, OrmResult};
pub use hydrate::{Entity, MAX_SAFE_INTEGER, coerce_numeric};
pub use metadata::{
    ColumnKind, ColumnMetadata, ColumnType, DefaultValue, ModelMetadata, ModelRef, Registry,
};
pub use model::{CreatePayload, Model};
pub use pool::{Pool, PoolRef};
pub use populate::PopulateOptions;
pub use predicate::{Clause, CompareOp, Predicate, WhereQuery};
pub use query::{
    Count, Create, Destroy, ExecStatus, Find, FindOne, ReturnMany, ReturnNothing, ReturnOne,
    SharedQuery, Update,
};
pub use record::Record;
pub use repository::{Orm, ReadonlyRepository, Repository};
pub use sort::{Sort, SortDirection};

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, create_pool_with_manager_config};

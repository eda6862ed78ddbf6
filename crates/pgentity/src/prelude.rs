//! Convenient imports for typical `pgentity` usage.
//!
//! ```ignore
//! use pgentity::prelude::*;
//! ```

pub use crate::{
    ColumnMetadata, ColumnType, CreatePayload, Entity, Model, ModelMetadata, Orm, OrmConfig,
    OrmError, OrmResult, PopulateOptions, ReadonlyRepository, Record, Registry, Repository, Sort,
    WhereQuery,
};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};

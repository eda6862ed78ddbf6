//! The `Model` trait: ties a Rust marker type to a registry entry.

use crate::error::OrmResult;
use crate::record::Record;
use std::future::Future;

/// Payload handed to [`Model::before_create`].
///
/// A single-record `create` passes `One`, an array `create` passes `Many`; the
/// hook must hand back the same variant (and, for `Many`, the same count).
#[derive(Debug, Clone, PartialEq)]
pub enum CreatePayload {
    One(Record),
    Many(Vec<Record>),
}

impl CreatePayload {
    pub fn len(&self) -> usize {
        match self {
            CreatePayload::One(_) => 1,
            CreatePayload::Many(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_records(self) -> Vec<Record> {
        match self {
            CreatePayload::One(record) => vec![record],
            CreatePayload::Many(records) => records,
        }
    }
}

/// A model known to the registry.
///
/// Implement this on a zero-sized marker type. Instance behaviour lives in
/// traits (or inherent-style extension traits) implemented for
/// [`Entity<M>`](crate::Entity), so every hydrated value shares the same
/// methods without storing anything per instance.
///
/// ```ignore
/// struct Product;
///
/// impl Model for Product {
///     const NAME: &'static str = "Product";
///
///     async fn before_create(values: CreatePayload) -> OrmResult<CreatePayload> {
///         Ok(values)
///     }
/// }
/// ```
pub trait Model: Send + Sync + 'static {
    /// Registry name of the model (matched case-insensitively).
    const NAME: &'static str;

    /// Runs before defaults are applied and the INSERT is built.
    fn before_create(
        values: CreatePayload,
    ) -> impl Future<Output = OrmResult<CreatePayload>> + Send {
        async move { Ok(values) }
    }

    /// Runs before the UPDATE is built.
    fn before_update(values: Record) -> impl Future<Output = OrmResult<Record>> + Send {
        async move { Ok(values) }
    }
}

use crate::error::{OrmError, OrmResult};
use crate::hydrate::Entity;
use crate::record::Record;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::ReturnOne {}
    impl Sealed for super::ReturnMany {}
    impl Sealed for super::ReturnNothing {}
}

/// What a mutation hands back once awaited.
pub trait Returning<M>: sealed::Sealed + Send + 'static {
    type Output: Clone + Send + Sync + 'static;

    /// Whether the statement needs a RETURNING clause.
    const RETURNS_ROWS: bool;

    fn collect(model: &str, records: Vec<Record>) -> OrmResult<Self::Output>;
}

/// A single hydrated record (single-record `create`).
#[derive(Debug, Clone, Copy)]
pub struct ReturnOne;

/// Every affected record.
#[derive(Debug, Clone, Copy)]
pub struct ReturnMany;

/// Nothing: no RETURNING clause is emitted.
#[derive(Debug, Clone, Copy)]
pub struct ReturnNothing;

impl<M: 'static> Returning<M> for ReturnOne {
    type Output = Entity<M>;
    const RETURNS_ROWS: bool = true;

    fn collect(model: &str, records: Vec<Record>) -> OrmResult<Entity<M>> {
        records
            .into_iter()
            .next()
            .map(Entity::from_record)
            .ok_or_else(|| OrmError::not_found(format!("insert into `{model}` returned no row")))
    }
}

impl<M: 'static> Returning<M> for ReturnMany {
    type Output = Vec<Entity<M>>;
    const RETURNS_ROWS: bool = true;

    fn collect(_model: &str, records: Vec<Record>) -> OrmResult<Vec<Entity<M>>> {
        Ok(records.into_iter().map(Entity::from_record).collect())
    }
}

impl<M: 'static> Returning<M> for ReturnNothing {
    type Output = ();
    const RETURNS_ROWS: bool = false;

    fn collect(_model: &str, _records: Vec<Record>) -> OrmResult<()> {
        Ok(())
    }
}

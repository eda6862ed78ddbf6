use crate::error::{OrmError, OrmResult};
use crate::hydrate::hydrate_rows;
use crate::log::hook_trace;
use crate::model::Model;
use crate::predicate::WhereQuery;
use crate::query::{
    BoxFuture, Directives, ReturnMany, ReturnNothing, Returning, SharedQuery, execute,
    impl_where_methods,
};
use crate::record::Record;
use crate::repository::RepoCore;
use crate::sql::{ReturnColumns, build_update};
use std::future::IntoFuture;
use std::marker::PhantomData;

/// `update`: one UPDATE over every matching record.
///
/// Resolves to the updated records (always a `Vec`, even for a single match)
/// unless `without_records()` is used.
#[must_use = "mutations do nothing unless awaited"]
pub struct Update<M, R = ReturnMany> {
    core: RepoCore,
    values: Record,
    returning: ReturnColumns,
    directives: Directives,
    _marker: PhantomData<fn() -> (M, R)>,
}

impl<M: Model, R: Returning<M>> Update<M, R> {
    pub(crate) fn new(
        core: RepoCore,
        where_: WhereQuery,
        values: Record,
        build_error: Option<OrmError>,
    ) -> Self {
        Self {
            core,
            values,
            returning: ReturnColumns::All,
            directives: Directives {
                where_,
                build_error,
                ..Directives::default()
            },
            _marker: PhantomData,
        }
    }

    impl_where_methods!();

    /// Return only these properties (plus the primary key).
    pub fn return_select<I, S>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returning = ReturnColumns::Select(props.into_iter().map(Into::into).collect());
        self
    }

    /// Skip the RETURNING clause; resolves to `()`.
    pub fn without_records(self) -> Update<M, ReturnNothing> {
        Update {
            core: self.core,
            values: self.values,
            returning: ReturnColumns::Nothing,
            directives: self.directives,
            _marker: PhantomData,
        }
    }

    /// Execute once, no matter how many clones await it.
    pub fn shared(self) -> SharedQuery<R::Output> {
        SharedQuery::new(self.into_future())
    }

    async fn run(self) -> OrmResult<R::Output> {
        let Self {
            core,
            values,
            returning,
            directives,
            ..
        } = self;
        let model = &core.model;
        directives.validate(model)?;

        hook_trace!(model = model.name(), hook = "before_update");
        let values = M::before_update(values).await?;

        let returning = if R::RETURNS_ROWS {
            returning
        } else {
            ReturnColumns::Nothing
        };
        let stmt = build_update(model, &core.registry, &directives.where_, &values, &returning)?;
        let pool = directives.pool.clone().unwrap_or_else(|| core.pool.clone());
        let rows = execute(&core, model, &pool, "update", stmt).await?;
        let records = if R::RETURNS_ROWS {
            hydrate_rows(model, rows)?
        } else {
            Vec::new()
        };
        R::collect(model.name(), records)
    }
}

impl<M: Model, R: Returning<M>> IntoFuture for Update<M, R> {
    type Output = OrmResult<R::Output>;
    type IntoFuture = BoxFuture<R::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}

use crate::error::OrmResult;
use crate::hydrate::hydrate_rows;
use crate::model::Model;
use crate::query::{
    BoxFuture, Directives, ReturnMany, ReturnNothing, Returning, SharedQuery, execute,
    impl_where_methods,
};
use crate::repository::RepoCore;
use crate::sql::{ReturnColumns, build_delete};
use std::future::IntoFuture;
use std::marker::PhantomData;

/// `destroy`: one DELETE. Without a `where_` every row is deleted.
///
/// Resolves to `()` unless `returning()` or `return_select(..)` asks for the
/// deleted records.
#[must_use = "mutations do nothing unless awaited"]
pub struct Destroy<M, R = ReturnNothing> {
    core: RepoCore,
    returning: ReturnColumns,
    directives: Directives,
    _marker: PhantomData<fn() -> (M, R)>,
}

impl<M: Model, R: Returning<M>> Destroy<M, R> {
    pub(crate) fn new(core: RepoCore) -> Self {
        Self {
            core,
            returning: ReturnColumns::Nothing,
            directives: Directives::default(),
            _marker: PhantomData,
        }
    }

    impl_where_methods!();

    /// Return every column of the deleted records.
    pub fn returning(self) -> Destroy<M, ReturnMany> {
        self.with_returning(ReturnColumns::All)
    }

    /// Return these properties of the deleted records. An empty list still
    /// returns the primary key.
    pub fn return_select<I, S>(self, props: I) -> Destroy<M, ReturnMany>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_returning(ReturnColumns::Select(props.into_iter().map(Into::into).collect()))
    }

    fn with_returning(self, returning: ReturnColumns) -> Destroy<M, ReturnMany> {
        Destroy {
            core: self.core,
            returning,
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
            returning,
            directives,
            ..
        } = self;
        let model = &core.model;
        directives.validate(model)?;

        let returning = if R::RETURNS_ROWS {
            returning
        } else {
            ReturnColumns::Nothing
        };
        let stmt = build_delete(model, &core.registry, &directives.where_, &returning)?;
        let pool = directives.pool.clone().unwrap_or_else(|| core.pool.clone());
        let rows = execute(&core, model, &pool, "destroy", stmt).await?;
        let records = if R::RETURNS_ROWS {
            hydrate_rows(model, rows)?
        } else {
            Vec::new()
        };
        R::collect(model.name(), records)
    }
}

impl<M: Model, R: Returning<M>> IntoFuture for Destroy<M, R> {
    type Output = OrmResult<R::Output>;
    type IntoFuture = BoxFuture<R::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}

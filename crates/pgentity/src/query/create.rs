use crate::error::{OrmError, OrmResult};
use crate::hydrate::hydrate_rows;
use crate::log::hook_trace;
use crate::model::{CreatePayload, Model};
use crate::pool::PoolRef;
use crate::query::{
    BoxFuture, Directives, ReturnNothing, ReturnOne, Returning, SharedQuery, execute,
};
use crate::repository::RepoCore;
use crate::sql::{ReturnColumns, build_insert};
use std::future::IntoFuture;
use std::marker::PhantomData;

/// `create`: one multi-row INSERT.
///
/// Single-record creates resolve to the hydrated record, array creates to a
/// `Vec`, and `without_records()` to `()` with no RETURNING clause.
#[must_use = "mutations do nothing unless awaited"]
pub struct Create<M, R = ReturnOne> {
    core: RepoCore,
    payload: CreatePayload,
    returning: ReturnColumns,
    directives: Directives,
    _marker: PhantomData<fn() -> (M, R)>,
}

impl<M: Model, R: Returning<M>> Create<M, R> {
    pub(crate) fn new(
        core: RepoCore,
        payload: CreatePayload,
        build_error: Option<OrmError>,
    ) -> Self {
        Self {
            core,
            payload,
            returning: ReturnColumns::All,
            directives: Directives {
                build_error,
                ..Directives::default()
            },
            _marker: PhantomData,
        }
    }

    /// Run on `pool` instead of the repository's pool.
    pub fn pool(mut self, pool: PoolRef) -> Self {
        self.directives.pool = Some(pool);
        self
    }

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
    pub fn without_records(self) -> Create<M, ReturnNothing> {
        Create {
            core: self.core,
            payload: self.payload,
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
            payload,
            returning,
            directives,
            ..
        } = self;
        let model = &core.model;
        directives.validate(model)?;

        if payload.is_empty() {
            return R::collect(model.name(), Vec::new());
        }

        let many = matches!(payload, CreatePayload::Many(_));
        let count = payload.len();
        hook_trace!(model = model.name(), hook = "before_create", records = count);
        let payload = M::before_create(payload).await?;
        if many != matches!(payload, CreatePayload::Many(_)) || count != payload.len() {
            return Err(OrmError::hook(
                model.name(),
                format!(
                    "before_create must return the same shape it was given ({count} record(s))"
                ),
            ));
        }
        let records = payload.into_records();

        let returning = if R::RETURNS_ROWS {
            returning
        } else {
            ReturnColumns::Nothing
        };
        let stmt = build_insert(model, &core.registry, &records, &returning)?;
        let pool = directives.pool.clone().unwrap_or_else(|| core.pool.clone());
        let rows = execute(&core, model, &pool, "create", stmt).await?;
        let records = if R::RETURNS_ROWS {
            hydrate_rows(model, rows)?
        } else {
            Vec::new()
        };
        R::collect(model.name(), records)
    }
}

impl<M: Model, R: Returning<M>> IntoFuture for Create<M, R> {
    type Output = OrmResult<R::Output>;
    type IntoFuture = BoxFuture<R::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}

use crate::error::OrmResult;
use crate::hydrate::{Entity, hydrate_rows};
use crate::populate::{self, PopulateOptions, PopulateRequest};
use crate::query::{
    BoxFuture, Directives, SharedQuery, execute, impl_select_methods, impl_where_methods,
};
use crate::record::Record;
use crate::repository::RepoCore;
use crate::sql::build_select;
use std::future::IntoFuture;
use std::marker::PhantomData;

/// Select, hydrate, then populate. Shared by `find` and `find_one`.
async fn fetch(core: RepoCore, directives: Directives, op: &str) -> OrmResult<Vec<Record>> {
    let model = &core.model;
    directives.validate(model)?;
    let stmt = build_select(model, &core.registry, &directives.plan())?;
    let stages = populate::plan(&core, directives.select.as_deref(), &directives.populates)?;

    let pool = directives
        .pool
        .clone()
        .unwrap_or_else(|| core.read_pool.clone());
    let rows = execute(&core, model, &pool, op, stmt).await?;
    let mut records = hydrate_rows(model, rows)?;
    if !records.is_empty() {
        populate::resolve(&core, &pool, stages, &mut records).await?;
    }
    Ok(records)
}

macro_rules! impl_populate_methods {
    () => {
        /// Resolve a relation onto every result.
        pub fn populate(self, property: &str) -> Self {
            self.populate_with(property, PopulateOptions::default())
        }

        /// Resolve a relation, applying `options` to its follow-up query.
        pub fn populate_with(mut self, property: &str, options: PopulateOptions) -> Self {
            self.directives
                .populates
                .push(PopulateRequest::new(property, options));
            self
        }
    };
}

/// `find`: every matching record.
#[must_use = "queries do nothing unless awaited"]
pub struct Find<M> {
    core: RepoCore,
    directives: Directives,
    _model: PhantomData<fn() -> M>,
}

impl<M: 'static> Find<M> {
    pub(crate) fn new(core: RepoCore) -> Self {
        Self {
            core,
            directives: Directives::default(),
            _model: PhantomData,
        }
    }

    impl_where_methods!();
    impl_select_methods!();
    impl_populate_methods!();

    /// Execute once, no matter how many clones await it.
    pub fn shared(self) -> SharedQuery<Vec<Entity<M>>> {
        SharedQuery::new(self.into_future())
    }
}

impl<M: 'static> IntoFuture for Find<M> {
    type Output = OrmResult<Vec<Entity<M>>>;
    type IntoFuture = BoxFuture<Vec<Entity<M>>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let records = fetch(self.core, self.directives, "find").await?;
            Ok(records.into_iter().map(Entity::from_record).collect())
        })
    }
}

/// `find_one`: the first matching record, if any (`LIMIT 1`).
#[must_use = "queries do nothing unless awaited"]
pub struct FindOne<M> {
    core: RepoCore,
    directives: Directives,
    _model: PhantomData<fn() -> M>,
}

impl<M: 'static> FindOne<M> {
    pub(crate) fn new(core: RepoCore) -> Self {
        Self {
            core,
            directives: Directives::default(),
            _model: PhantomData,
        }
    }

    impl_where_methods!();
    impl_populate_methods!();

    /// Restrict the selected properties. The primary key is always added.
    pub fn select<I, S>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.directives.select(props);
        self
    }

    /// Append sort terms; decides which record comes first.
    pub fn sort(mut self, sort: &str) -> Self {
        self.directives.sort(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.directives.skip = skip;
        self
    }

    /// Execute once, no matter how many clones await it.
    pub fn shared(self) -> SharedQuery<Option<Entity<M>>> {
        SharedQuery::new(self.into_future())
    }
}

impl<M: 'static> IntoFuture for FindOne<M> {
    type Output = OrmResult<Option<Entity<M>>>;
    type IntoFuture = BoxFuture<Option<Entity<M>>>;

    fn into_future(mut self) -> Self::IntoFuture {
        self.directives.limit = 1;
        Box::pin(async move {
            let records = fetch(self.core, self.directives, "find_one").await?;
            Ok(records.into_iter().next().map(Entity::from_record))
        })
    }
}

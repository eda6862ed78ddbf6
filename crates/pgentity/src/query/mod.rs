//! Deferred query and mutation builders.
//!
//! Every builder captures its directive set by value and does nothing until it
//! is awaited (`IntoFuture`). Awaiting consumes the builder, so one builder is
//! executed at most once; [`SharedQuery`] (via `.shared()`) hands a single
//! execution to any number of awaiters.
//!
//! ```ignore
//! let products = repo
//!     .find()
//!     .where_json(json!({ "store": 42, "name": { "like": "%shoe%" } }))
//!     .sort("name asc")
//!     .paginate(2, 20)
//!     .populate("store")
//!     .await?;
//! ```

mod count;
mod create;
mod destroy;
mod find;
mod returning;
mod shared;
mod update;

pub use count::Count;
pub use create::Create;
pub use destroy::Destroy;
pub use find::{Find, FindOne};
pub use returning::{ReturnMany, ReturnNothing, ReturnOne, Returning};
pub use shared::{ExecStatus, SharedQuery};
pub use update::Update;

use crate::error::{OrmError, OrmResult};
use crate::metadata::ModelMetadata;
use crate::pool::PoolRef;
use crate::populate::PopulateRequest;
use crate::predicate::WhereQuery;
use crate::repository::RepoCore;
use crate::sort::Sort;
use crate::sql::{SelectPlan, Statement};
use serde_json::Value;

/// Boxed, `Send` future returned by every builder's `into_future`.
pub type BoxFuture<T> = futures_util::future::BoxFuture<'static, OrmResult<T>>;

/// Model label used by errors raised before a builder knows its model.
pub(crate) const UNBOUND: &str = "<unbound>";

/// Accumulated directive set of one builder.
#[derive(Clone, Default)]
pub(crate) struct Directives {
    pub select: Option<Vec<String>>,
    pub where_: WhereQuery,
    pub sorts: Vec<Sort>,
    pub skip: u64,
    pub limit: u64,
    pub populates: Vec<PopulateRequest>,
    pub pool: Option<PoolRef>,
    /// First error recorded while chaining; reported when awaited.
    pub build_error: Option<OrmError>,
}

impl Directives {
    pub fn fail(&mut self, err: OrmError) {
        if self.build_error.is_none() {
            self.build_error = Some(err);
        }
    }

    pub fn and_where(&mut self, query: WhereQuery) {
        let current = std::mem::take(&mut self.where_);
        self.where_ = current.and_where(query);
    }

    pub fn and_where_json(&mut self, query: Value) {
        match WhereQuery::from_json(query) {
            Ok(query) => self.and_where(query),
            Err(err) => self.fail(err),
        }
    }

    pub fn select<I, S>(&mut self, props: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(props.into_iter().map(Into::into).collect());
    }

    pub fn sort(&mut self, input: &str) {
        match Sort::parse(UNBOUND, input) {
            Ok(sorts) => self.sorts.extend(sorts),
            Err(err) => self.fail(err),
        }
    }

    /// `page` is 1-based; values below 1 are treated as 1.
    pub fn paginate(&mut self, page: u64, limit: u64) {
        let page = page.max(1);
        self.limit = limit;
        self.skip = (page - 1) * limit;
    }

    /// Surface a recorded build error, labelled with `model`.
    pub fn validate(&self, model: &ModelMetadata) -> OrmResult<()> {
        match &self.build_error {
            None => Ok(()),
            Some(OrmError::Query {
                model: m,
                message,
                predicate,
            }) if m == UNBOUND => Err(OrmError::Query {
                model: model.name().to_string(),
                message: message.clone(),
                predicate: predicate.clone(),
            }),
            Some(err) => Err(err.clone()),
        }
    }

    pub fn plan(&self) -> SelectPlan {
        SelectPlan {
            select: self.select.clone(),
            where_: self.where_.clone(),
            sorts: self.sorts.clone(),
            skip: self.skip,
            limit: self.limit,
        }
    }
}

/// Log `stmt` and send it through `pool`.
pub(crate) async fn execute(
    core: &RepoCore,
    model: &ModelMetadata,
    pool: &PoolRef,
    op: &str,
    stmt: Statement,
) -> OrmResult<Vec<Value>> {
    core.sql_log.statement(model.name(), op, &stmt);
    pool.query(&stmt.sql, &stmt.params).await
}

/// `where_`, `where_json` and `pool` for any builder with a `directives` field.
macro_rules! impl_where_methods {
    () => {
        /// AND `query` onto the WHERE clause.
        pub fn where_(mut self, query: $crate::predicate::WhereQuery) -> Self {
            self.directives.and_where(query);
            self
        }

        /// AND a loose-form predicate onto the WHERE clause.
        ///
        /// A malformed predicate is reported when the builder is awaited.
        pub fn where_json(mut self, query: serde_json::Value) -> Self {
            self.directives.and_where_json(query);
            self
        }

        /// Run on `pool` instead of the repository's pool.
        pub fn pool(mut self, pool: $crate::pool::PoolRef) -> Self {
            self.directives.pool = Some(pool);
            self
        }
    };
}

/// Projection, ordering and paging methods.
macro_rules! impl_select_methods {
    () => {
        /// Restrict the selected properties. The primary key is always added.
        pub fn select<I, S>(mut self, props: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.directives.select(props);
            self
        }

        /// Append sort terms: `"name"`, `"name desc"`, `"name asc, id desc"`.
        pub fn sort(mut self, sort: &str) -> Self {
            self.directives.sort(sort);
            self
        }

        /// Append one sort term.
        pub fn sort_by(mut self, sort: $crate::sort::Sort) -> Self {
            self.directives.sorts.push(sort);
            self
        }

        /// OFFSET; `0` emits none.
        pub fn skip(mut self, skip: u64) -> Self {
            self.directives.skip = skip;
            self
        }

        /// LIMIT; `0` emits none.
        pub fn limit(mut self, limit: u64) -> Self {
            self.directives.limit = limit;
            self
        }

        /// Page through results: `skip = (page - 1) * limit`.
        pub fn paginate(mut self, page: u64, limit: u64) -> Self {
            self.directives.paginate(page, limit);
            self
        }
    };
}

pub(crate) use {impl_select_methods, impl_where_methods};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paginate_clamps_page() {
        let mut d = Directives::default();
        d.paginate(0, 10);
        assert_eq!((d.skip, d.limit), (0, 10));
        d.paginate(3, 10);
        assert_eq!((d.skip, d.limit), (20, 10));
    }

    #[test]
    fn first_build_error_wins_and_is_relabelled() {
        let mut d = Directives::default();
        d.and_where_json(json!(5));
        d.sort("name sideways");
        let model = ModelMetadata::new("Product", "products");
        let err = d.validate(&model).unwrap_err();
        assert!(err.to_string().contains("`Product`"));
        assert!(err.to_string().contains("invalid where clause"));
    }

    #[test]
    fn where_calls_accumulate() {
        let mut d = Directives::default();
        d.and_where(WhereQuery::new().eq("a", 1));
        d.and_where_json(json!({ "b": 2 }));
        assert_eq!(d.where_.clauses().len(), 2);
    }
}

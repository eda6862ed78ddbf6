use crate::error::{OrmError, OrmResult};
use crate::query::{BoxFuture, Directives, SharedQuery, execute, impl_where_methods};
use crate::repository::RepoCore;
use crate::sql::build_count;
use serde_json::Value;
use std::future::IntoFuture;
use std::marker::PhantomData;

/// `count`: number of matching records.
#[must_use = "queries do nothing unless awaited"]
pub struct Count<M> {
    core: RepoCore,
    directives: Directives,
    _model: PhantomData<fn() -> M>,
}

impl<M: 'static> Count<M> {
    pub(crate) fn new(core: RepoCore) -> Self {
        Self {
            core,
            directives: Directives::default(),
            _model: PhantomData,
        }
    }

    impl_where_methods!();

    /// Execute once, no matter how many clones await it.
    pub fn shared(self) -> SharedQuery<u64> {
        SharedQuery::new(self.into_future())
    }
}

/// The driver reports `count(*)` as bigint; other pools may hand back text.
fn parse_count(row: Option<&Value>) -> OrmResult<u64> {
    let Some(value) = row.and_then(|r| r.get("count")) else {
        return Ok(0);
    };
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        OrmError::decode(
            "count",
            format!("expected a non-negative integer, got {value}"),
        )
    })
}

impl<M: 'static> IntoFuture for Count<M> {
    type Output = OrmResult<u64>;
    type IntoFuture = BoxFuture<u64>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let Self {
                core, directives, ..
            } = self;
            let model = &core.model;
            directives.validate(model)?;
            let stmt = build_count(model, &core.registry, &directives.where_)?;
            let pool = directives
                .pool
                .clone()
                .unwrap_or_else(|| core.read_pool.clone());
            let rows = execute(&core, model, &pool, "count", stmt).await?;
            parse_count(rows.first())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn count_accepts_numbers_and_text() {
        assert_eq!(parse_count(Some(&json!({ "count": 3 }))).unwrap(), 3);
        assert_eq!(parse_count(Some(&json!({ "count": "42" }))).unwrap(), 42);
        assert_eq!(parse_count(None).unwrap(), 0);
        assert!(parse_count(Some(&json!({ "count": -1 }))).is_err());
    }
}

//! Repositories: the entry points that hand out builders.

use crate::config::OrmConfig;
use crate::error::{OrmError, OrmResult};
use crate::log::SqlLog;
use crate::metadata::{ColumnKind, ColumnMetadata, ModelMetadata, ModelRef, Registry};
use crate::model::{CreatePayload, Model};
use crate::pool::PoolRef;
use crate::predicate::WhereQuery;
use crate::query::{Count, Create, Destroy, Find, FindOne, ReturnMany, ReturnOne, Update};
use crate::record::Record;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

/// Everything a builder needs to execute against one model.
#[derive(Clone)]
pub(crate) struct RepoCore {
    pub model: Arc<ModelMetadata>,
    pub registry: Arc<Registry>,
    /// Pool for mutations.
    pub pool: PoolRef,
    /// Pool for `find`, `find_one`, `count` and population.
    pub read_pool: PoolRef,
    pub sql_log: SqlLog,
}

/// An initialized registry bound to its pools.
///
/// ```ignore
/// let registry = Registry::new()
///     .with(ModelMetadata::new("Store", "stores").with_column(...))?
///     .with(ModelMetadata::new("Product", "products").with_column(...))?;
/// let orm = Orm::initialize(registry, OrmConfig::new(Arc::new(pool)))?;
///
/// let products = orm.repository::<Product>()?;
/// let cheap = products.find().where_json(json!({ "price": { "<": 10 } })).await?;
/// ```
#[derive(Clone)]
pub struct Orm {
    registry: Arc<Registry>,
    config: OrmConfig,
    sql_log: SqlLog,
}

impl Orm {
    /// Check the registry against the configured pools.
    ///
    /// Every literal relation target must be registered, every has-many `via`
    /// must name a property of the target (or junction), and every
    /// connection name must have a configured pool. Deferred targets are
    /// resolved at query time.
    pub fn initialize(registry: Registry, config: OrmConfig) -> OrmResult<Self> {
        for model in registry.iter() {
            if let Some(name) = model.connection_name()
                && !config.connections.contains_key(name)
            {
                return Err(OrmError::configuration(format!(
                    "model `{}` uses connection `{name}`, which is not configured",
                    model.name()
                )));
            }
            for column in model.columns() {
                check_relation(&registry, model, column)?;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            target: "pgentity",
            models = registry.len(),
            connections = config.connections.len(),
            "orm initialized"
        );

        let sql_log = SqlLog::new(config.log_sql_max_length);
        Ok(Self {
            registry: Arc::new(registry),
            config,
            sql_log,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn core<M: Model>(&self) -> OrmResult<RepoCore> {
        let model = self.registry.get(M::NAME)?;
        let (pool, read_pool) = self
            .config
            .pools_for(model.connection_name())
            .ok_or_else(|| {
                OrmError::configuration(format!(
                    "no pool configured for model `{}`",
                    model.name()
                ))
            })?;
        Ok(RepoCore {
            model,
            registry: Arc::clone(&self.registry),
            pool,
            read_pool,
            sql_log: self.sql_log,
        })
    }

    /// A read/write repository. Fails for models declared `readonly`.
    pub fn repository<M: Model>(&self) -> OrmResult<Repository<M>> {
        let core = self.core::<M>()?;
        if core.model.is_readonly() {
            return Err(OrmError::configuration(format!(
                "model `{}` is readonly; use readonly_repository",
                core.model.name()
            )));
        }
        Ok(Repository {
            inner: ReadonlyRepository::new(core),
        })
    }

    pub fn readonly_repository<M: Model>(&self) -> OrmResult<ReadonlyRepository<M>> {
        Ok(ReadonlyRepository::new(self.core::<M>()?))
    }
}

impl fmt::Debug for Orm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orm")
            .field("models", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

fn check_relation(
    registry: &Registry,
    model: &ModelMetadata,
    column: &ColumnMetadata,
) -> OrmResult<()> {
    let literal = |target: &ModelRef| match target {
        ModelRef::Literal(_) => registry.resolve(target).map(Some),
        ModelRef::Deferred(_) => Ok(None),
    };
    match &column.kind {
        ColumnKind::Plain { .. } => Ok(()),
        ColumnKind::BelongsTo { target } => literal(target).map(|_| ()),
        ColumnKind::Collection {
            target,
            via,
            through,
        } => {
            let target = literal(target)?;
            let holder = match through {
                Some(junction) => literal(junction)?,
                None => target,
            };
            if let Some(holder) = holder
                && holder.column(via).is_none()
            {
                return Err(OrmError::configuration(format!(
                    "`{}.{}`: via `{via}` is not a property of `{}`",
                    model.name(),
                    column.property_name,
                    holder.name()
                )));
            }
            Ok(())
        }
    }
}

/// Serialize a create/update payload into a record.
fn to_record<T: Serialize + ?Sized>(model: &str, value: &T) -> Result<Record, OrmError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(OrmError::query_with_predicate(
            model,
            "payload must serialize to an object",
            other.to_string(),
        )),
        Err(e) => Err(OrmError::query(model, format!("payload failed to serialize: {e}"))),
    }
}

/// Read access to one model: `find`, `find_one` and `count`.
pub struct ReadonlyRepository<M> {
    core: RepoCore,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for ReadonlyRepository<M> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> ReadonlyRepository<M> {
    fn new(core: RepoCore) -> Self {
        Self {
            core,
            _model: PhantomData,
        }
    }

    pub fn model(&self) -> &ModelMetadata {
        &self.core.model
    }

    pub fn find(&self) -> Find<M> {
        Find::new(self.core.clone())
    }

    pub fn find_one(&self) -> FindOne<M> {
        FindOne::new(self.core.clone())
    }

    pub fn count(&self) -> Count<M> {
        Count::new(self.core.clone())
    }
}

impl<M: Model> fmt::Debug for ReadonlyRepository<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadonlyRepository")
            .field("model", &M::NAME)
            .finish()
    }
}

/// Read/write access to one model.
///
/// Derefs to [`ReadonlyRepository`] for the read operations.
pub struct Repository<M> {
    inner: ReadonlyRepository<M>,
}

impl<M> Clone for Repository<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M> Deref for Repository<M> {
    type Target = ReadonlyRepository<M>;

    fn deref(&self) -> &ReadonlyRepository<M> {
        &self.inner
    }
}

impl<M: Model> fmt::Debug for Repository<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository").field("model", &M::NAME).finish()
    }
}

impl<M: Model> Repository<M> {
    fn core(&self) -> RepoCore {
        self.inner.core.clone()
    }

    /// Insert one record; resolves to the created entity.
    pub fn create<T: Serialize + ?Sized>(&self, values: &T) -> Create<M, ReturnOne> {
        let core = self.core();
        match to_record(core.model.name(), values) {
            Ok(record) => Create::new(core, CreatePayload::One(record), None),
            Err(err) => Create::new(core, CreatePayload::One(Record::new()), Some(err)),
        }
    }

    /// Insert several records in one statement; resolves to the created
    /// entities. An empty input resolves to an empty `Vec` without a query.
    pub fn create_many<I, T>(&self, values: I) -> Create<M, ReturnMany>
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        let core = self.core();
        let records: Result<Vec<Record>, OrmError> = values
            .into_iter()
            .map(|v| to_record(core.model.name(), &v))
            .collect();
        match records {
            Ok(records) => Create::new(core, CreatePayload::Many(records), None),
            Err(err) => Create::new(core, CreatePayload::Many(Vec::new()), Some(err)),
        }
    }

    /// Update every record matching `where_`. More predicates may be chained.
    pub fn update<T: Serialize + ?Sized>(&self, where_: WhereQuery, values: &T) -> Update<M> {
        let core = self.core();
        match to_record(core.model.name(), values) {
            Ok(record) => Update::new(core, where_, record, None),
            Err(err) => Update::new(core, where_, Record::new(), Some(err)),
        }
    }

    /// Delete matching records. Chain `where_`/`where_json`; without a
    /// predicate every row is deleted.
    pub fn destroy(&self) -> Destroy<M> {
        Destroy::new(self.core())
    }
}

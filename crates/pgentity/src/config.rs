use crate::pool::PoolRef;
use std::collections::HashMap;
use std::fmt;

/// A named pool selected by `ModelMetadata::connection`.
#[derive(Clone)]
pub struct Connection {
    pub pool: PoolRef,
    /// Pool used by reads on models bound to this connection.
    pub readonly_pool: Option<PoolRef>,
}

/// Configuration for [`Orm::initialize`](crate::Orm::initialize).
///
/// ```ignore
/// let config = OrmConfig::new(Arc::new(primary))
///     .readonly_pool(Arc::new(replica))
///     .connection("analytics", Arc::new(warehouse))
///     .log_sql_max_length(500);
/// ```
#[derive(Clone)]
pub struct OrmConfig {
    /// Pool used by models without a connection name.
    pub pool: PoolRef,
    /// Pool used by `find`, `find_one`, `count` and population.
    pub readonly_pool: Option<PoolRef>,
    pub connections: HashMap<String, Connection>,
    /// Truncate logged SQL (in bytes). `None` logs it whole.
    pub log_sql_max_length: Option<usize>,
}

impl OrmConfig {
    pub fn new(pool: PoolRef) -> Self {
        Self {
            pool,
            readonly_pool: None,
            connections: HashMap::new(),
            log_sql_max_length: Some(200),
        }
    }

    /// Route reads on the default connection to `pool`.
    pub fn readonly_pool(mut self, pool: PoolRef) -> Self {
        self.readonly_pool = Some(pool);
        self
    }

    /// Register a named connection.
    pub fn connection(mut self, name: &str, pool: PoolRef) -> Self {
        self.connections.insert(
            name.to_string(),
            Connection {
                pool,
                readonly_pool: None,
            },
        );
        self
    }

    /// Register a named connection with a separate read pool.
    pub fn connection_with_readonly(
        mut self,
        name: &str,
        pool: PoolRef,
        readonly: PoolRef,
    ) -> Self {
        self.connections.insert(
            name.to_string(),
            Connection {
                pool,
                readonly_pool: Some(readonly),
            },
        );
        self
    }

    pub fn log_sql_max_length(mut self, max: usize) -> Self {
        self.log_sql_max_length = Some(max);
        self
    }

    /// Log full SQL strings.
    pub fn no_sql_truncation(mut self) -> Self {
        self.log_sql_max_length = None;
        self
    }

    /// `(write, read)` pools for a model's connection name.
    pub(crate) fn pools_for(&self, connection: Option<&str>) -> Option<(PoolRef, PoolRef)> {
        match connection {
            None => {
                let read = self.readonly_pool.clone().unwrap_or_else(|| self.pool.clone());
                Some((self.pool.clone(), read))
            }
            Some(name) => self.connections.get(name).map(|c| {
                let read = c.readonly_pool.clone().unwrap_or_else(|| c.pool.clone());
                (c.pool.clone(), read)
            }),
        }
    }
}

impl fmt::Debug for OrmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.connections.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("OrmConfig")
            .field("readonly_pool", &self.readonly_pool.is_some())
            .field("connections", &names)
            .field("log_sql_max_length", &self.log_sql_max_length)
            .finish()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("readonly_pool", &self.readonly_pool.is_some())
            .finish()
    }
}

use crate::error::{OrmError, OrmResult};
use crate::metadata::column::ColumnMetadata;
use std::collections::HashMap;

/// Finished, reconciled description of one model.
///
/// Columns are already flattened (inherited and modifier columns merged) by the
/// declaration layer; the engine never walks an inheritance graph.
#[derive(Debug, Clone)]
pub struct ModelMetadata {
    name: String,
    table_name: String,
    connection_name: Option<String>,
    readonly: bool,
    columns: Vec<ColumnMetadata>,
    by_name: HashMap<String, usize>,
    by_property: HashMap<String, usize>,
    primary_key: Option<usize>,
}

impl ModelMetadata {
    pub fn new(name: &str, table_name: &str) -> Self {
        Self {
            name: name.to_string(),
            table_name: table_name.to_string(),
            connection_name: None,
            readonly: false,
            columns: Vec::new(),
            by_name: HashMap::new(),
            by_property: HashMap::new(),
            primary_key: None,
        }
    }

    /// Route this model's statements through a named connection.
    pub fn connection(mut self, name: &str) -> Self {
        self.connection_name = Some(name.to_string());
        self
    }

    /// Mark the model read-only (no create/update/destroy).
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Append a column.
    pub fn with_column(mut self, column: ColumnMetadata) -> Self {
        let idx = self.columns.len();
        if column.primary && self.primary_key.is_none() {
            self.primary_key = Some(idx);
        }
        self.by_name.entry(column.name.clone()).or_insert(idx);
        self.by_property
            .entry(column.property_name.clone())
            .or_insert(idx);
        self.columns.push(column);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn connection_name(&self) -> Option<&str> {
        self.connection_name.as_deref()
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    /// Look up a column by property name.
    pub fn column(&self, property_name: &str) -> Option<&ColumnMetadata> {
        self.by_property
            .get(property_name)
            .map(|&idx| &self.columns[idx])
    }

    /// Look up a column by database column name.
    pub fn column_by_name(&self, name: &str) -> Option<&ColumnMetadata> {
        self.by_name.get(name).map(|&idx| &self.columns[idx])
    }

    pub fn primary_key_column(&self) -> Option<&ColumnMetadata> {
        self.primary_key.map(|idx| &self.columns[idx])
    }

    /// Primary key column, or a configuration error naming the model.
    pub fn require_primary_key(&self) -> OrmResult<&ColumnMetadata> {
        self.primary_key_column().ok_or_else(|| {
            OrmError::configuration(format!(
                "model `{}` does not declare a primary key column",
                self.name
            ))
        })
    }

    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> OrmResult<()> {
        if self.name.trim().is_empty() {
            return Err(OrmError::configuration("model name cannot be empty"));
        }
        if self.table_name.trim().is_empty() {
            return Err(OrmError::configuration(format!(
                "model `{}` does not declare a table name",
                self.name
            )));
        }
        self.require_primary_key()?;

        for (idx, column) in self.columns.iter().enumerate() {
            if column.property_name.is_empty() || column.name.is_empty() {
                return Err(OrmError::configuration(format!(
                    "model `{}` has a column without a name",
                    self.name
                )));
            }
            if self.by_property.get(&column.property_name) != Some(&idx) {
                return Err(OrmError::configuration(format!(
                    "model `{}` declares property `{}` more than once",
                    self.name, column.property_name
                )));
            }
            if !column.is_collection() && self.by_name.get(&column.name) != Some(&idx) {
                return Err(OrmError::configuration(format!(
                    "model `{}` maps column `{}` more than once",
                    self.name, column.name
                )));
            }
            if column.primary && column.is_collection() {
                return Err(OrmError::configuration(format!(
                    "model `{}`: collection `{}` cannot be the primary key",
                    self.name, column.property_name
                )));
            }
        }
        Ok(())
    }
}

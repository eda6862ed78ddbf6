//! Column descriptors.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Declared type of a plain column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
    Json,
    Binary,
    Uuid,
    /// `TEXT[]`
    StringArray,
    /// `INTEGER[]`
    IntegerArray,
    /// `NUMERIC[]`
    FloatArray,
    /// `BOOLEAN[]`
    BooleanArray,
}

impl ColumnType {
    /// SQL type used for `::TYPE[]` casts. For array columns this is the
    /// element type.
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::String | ColumnType::StringArray => "TEXT",
            ColumnType::Integer | ColumnType::IntegerArray => "INTEGER",
            ColumnType::Float | ColumnType::FloatArray => "NUMERIC",
            ColumnType::Boolean | ColumnType::BooleanArray => "BOOLEAN",
            ColumnType::Date => "DATE",
            ColumnType::Datetime => "TIMESTAMPTZ",
            ColumnType::Json => "JSONB",
            ColumnType::Binary => "BYTEA",
            ColumnType::Uuid => "UUID",
        }
    }

    /// Whether the column itself stores a SQL array.
    pub fn is_array(self) -> bool {
        matches!(
            self,
            ColumnType::StringArray
                | ColumnType::IntegerArray
                | ColumnType::FloatArray
                | ColumnType::BooleanArray
        )
    }

    /// Whether string values read from this column may be coerced to numbers.
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

/// A column default: either a literal copied into each record or a generator
/// invoked once per record at call time.
#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Generator(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// Produce the value for one record.
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Literal(v) => v.clone(),
            DefaultValue::Generator(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            DefaultValue::Generator(_) => f.write_str("Generator(<fn>)"),
        }
    }
}

/// Reference to another model by name.
///
/// `Deferred` lets a declaration point at a model that is registered later
/// (circular relations); it is only evaluated at query/populate time.
#[derive(Clone)]
pub enum ModelRef {
    Literal(String),
    Deferred(Arc<dyn Fn() -> String + Send + Sync>),
}

impl ModelRef {
    /// Create a reference resolved lazily through `resolver`.
    pub fn deferred(resolver: impl Fn() -> String + Send + Sync + 'static) -> Self {
        ModelRef::Deferred(Arc::new(resolver))
    }

    /// The referenced model name.
    pub fn name(&self) -> String {
        match self {
            ModelRef::Literal(name) => name.clone(),
            ModelRef::Deferred(resolver) => resolver(),
        }
    }
}

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRef::Literal(name) => f.debug_tuple("Literal").field(name).finish(),
            ModelRef::Deferred(_) => f.write_str("Deferred(<fn>)"),
        }
    }
}

impl From<&str> for ModelRef {
    fn from(name: &str) -> Self {
        ModelRef::Literal(name.to_string())
    }
}

impl From<String> for ModelRef {
    fn from(name: String) -> Self {
        ModelRef::Literal(name)
    }
}

/// Variant-specific part of a column.
#[derive(Debug, Clone)]
pub enum ColumnKind {
    /// A physical column with a scalar (or array) type.
    Plain {
        ty: ColumnType,
        enum_values: Option<Vec<Value>>,
        max_length: Option<usize>,
    },
    /// A physical foreign-key column pointing at another model's primary key.
    BelongsTo { target: ModelRef },
    /// A virtual has-many / many-to-many relation. `via` names the
    /// foreign-key property on the target (or junction) model.
    Collection {
        target: ModelRef,
        via: String,
        through: Option<ModelRef>,
    },
}

/// Descriptor for one column of a model.
#[derive(Debug, Clone)]
pub struct ColumnMetadata {
    /// Database column name.
    pub name: String,
    /// Property name exposed on hydrated values and used in predicates.
    pub property_name: String,
    pub required: bool,
    pub primary: bool,
    /// Whether the column may be written by `create`.
    pub insert: bool,
    /// Whether the column may be written by `update`.
    pub update: bool,
    pub create_date: bool,
    pub update_date: bool,
    pub version: bool,
    pub defaults_to: Option<DefaultValue>,
    pub kind: ColumnKind,
}

impl ColumnMetadata {
    fn with_kind(property_name: &str, kind: ColumnKind) -> Self {
        Self {
            name: property_name.to_string(),
            property_name: property_name.to_string(),
            required: false,
            primary: false,
            insert: true,
            update: true,
            create_date: false,
            update_date: false,
            version: false,
            defaults_to: None,
            kind,
        }
    }

    /// A plain column whose db name equals its property name.
    pub fn plain(property_name: &str, ty: ColumnType) -> Self {
        Self::with_kind(
            property_name,
            ColumnKind::Plain {
                ty,
                enum_values: None,
                max_length: None,
            },
        )
    }

    /// A foreign-key column referencing `target`'s primary key.
    pub fn belongs_to(property_name: &str, target: impl Into<ModelRef>) -> Self {
        Self::with_kind(
            property_name,
            ColumnKind::BelongsTo {
                target: target.into(),
            },
        )
    }

    /// A has-many collection: rows of `target` whose `via` property points back here.
    pub fn collection(property_name: &str, target: impl Into<ModelRef>, via: &str) -> Self {
        Self::with_kind(
            property_name,
            ColumnKind::Collection {
                target: target.into(),
                via: via.to_string(),
                through: None,
            },
        )
    }

    /// Set the database column name (property name is unchanged).
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Allow or forbid writing this column on insert.
    pub fn insert(mut self, insert: bool) -> Self {
        self.insert = insert;
        self
    }

    /// Allow or forbid writing this column on update.
    pub fn update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    pub fn create_date(mut self) -> Self {
        self.create_date = true;
        self
    }

    pub fn update_date(mut self) -> Self {
        self.update_date = true;
        self
    }

    pub fn version(mut self) -> Self {
        self.version = true;
        self
    }

    /// Literal default copied into records that omit this property.
    pub fn defaults_to(mut self, value: impl Into<Value>) -> Self {
        self.defaults_to = Some(DefaultValue::Literal(value.into()));
        self
    }

    /// Default produced by calling `generator` once per record.
    pub fn defaults_to_fn(mut self, generator: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.defaults_to = Some(DefaultValue::Generator(Arc::new(generator)));
        self
    }

    /// Make a collection many-to-many through the `junction` model.
    pub fn through(mut self, junction: impl Into<ModelRef>) -> Self {
        if let ColumnKind::Collection { through, .. } = &mut self.kind {
            *through = Some(junction.into());
        }
        self
    }

    /// Restrict a plain column to a set of values.
    pub fn enum_values(mut self, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        if let ColumnKind::Plain { enum_values, .. } = &mut self.kind {
            *enum_values = Some(values.into_iter().map(Into::into).collect());
        }
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        if let ColumnKind::Plain { max_length, .. } = &mut self.kind {
            *max_length = Some(len);
        }
        self
    }

    /// Declared type for plain columns.
    pub fn column_type(&self) -> Option<ColumnType> {
        match &self.kind {
            ColumnKind::Plain { ty, .. } => Some(*ty),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, ColumnKind::Collection { .. })
    }

    pub fn is_belongs_to(&self) -> bool {
        matches!(self.kind, ColumnKind::BelongsTo { .. })
    }

    /// Relation target for belongs-to and collection columns.
    pub fn target(&self) -> Option<&ModelRef> {
        match &self.kind {
            ColumnKind::BelongsTo { target } | ColumnKind::Collection { target, .. } => {
                Some(target)
            }
            ColumnKind::Plain { .. } => None,
        }
    }
}

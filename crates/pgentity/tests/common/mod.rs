#![allow(dead_code)]

use async_trait::async_trait;
use pgentity::{
    ColumnMetadata, ColumnType, CreatePayload, Model, ModelMetadata, Orm, OrmConfig, OrmError,
    OrmResult, Pool, PoolRef, Record, Registry,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One statement received by [`MockPool`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub sql: String,
    pub params: Vec<Value>,
}

/// A pool that records every statement and answers from a queue.
///
/// An empty queue answers with no rows.
#[derive(Default)]
pub struct MockPool {
    calls: Mutex<Vec<Call>>,
    responses: Mutex<VecDeque<OrmResult<Vec<Value>>>>,
}

impl MockPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, rows: Vec<Value>) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(rows));
        self
    }

    pub fn fail(&self, err: OrmError) -> &Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.sql).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Pool for MockPool {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Value>> {
        self.calls.lock().unwrap().push(Call {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        let response = self.responses.lock().unwrap().pop_front();
        // Give concurrent awaiters a chance to interleave.
        tokio::task::yield_now().await;
        response.unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub struct Store;
pub struct Product;
pub struct Category;
pub struct Folder;
pub struct Country;
pub struct Ticket;
pub struct Note;
/// Bound to `Note`, but its create hook always collapses the payload to one record.
pub struct ShapeShifter;

impl Model for Store {
    const NAME: &'static str = "Store";
}

impl Model for Product {
    const NAME: &'static str = "Product";
}

impl Model for Category {
    const NAME: &'static str = "Category";
}

impl Model for Folder {
    const NAME: &'static str = "Folder";
}

impl Model for Country {
    const NAME: &'static str = "Country";
}

impl Model for Ticket {
    const NAME: &'static str = "Ticket";
}

impl Model for Note {
    const NAME: &'static str = "Note";

    async fn before_create(values: CreatePayload) -> OrmResult<CreatePayload> {
        let slug = |record: &mut Record| {
            let slug = match record.get("title") {
                Some(Value::String(title)) => title.to_lowercase().replace(' ', "-"),
                _ => return,
            };
            record.insert("slug".into(), Value::String(slug));
        };
        Ok(match values {
            CreatePayload::One(mut record) => {
                slug(&mut record);
                CreatePayload::One(record)
            }
            CreatePayload::Many(mut records) => {
                records.iter_mut().for_each(slug);
                CreatePayload::Many(records)
            }
        })
    }

    async fn before_update(mut values: Record) -> OrmResult<Record> {
        values.insert("edited".into(), Value::Bool(true));
        Ok(values)
    }
}

impl Model for ShapeShifter {
    const NAME: &'static str = "Note";

    async fn before_create(values: CreatePayload) -> OrmResult<CreatePayload> {
        let first = values.into_records().into_iter().next().unwrap_or_default();
        Ok(CreatePayload::One(first))
    }
}

pub fn registry() -> Registry {
    let codes = Arc::new(AtomicUsize::new(0));
    let models = [
        ModelMetadata::new("Store", "stores")
            .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary())
            .with_column(ColumnMetadata::plain("name", ColumnType::String))
            .with_column(ColumnMetadata::collection("products", "Product", "store")),
        ModelMetadata::new("Product", "products")
            .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary())
            .with_column(ColumnMetadata::plain("name", ColumnType::String))
            .with_column(ColumnMetadata::plain("price", ColumnType::Float))
            .with_column(ColumnMetadata::belongs_to("store", "Store").name("store_id"))
            .with_column(
                ColumnMetadata::collection("categories", "Category", "product")
                    .through("ProductCategory"),
            ),
        ModelMetadata::new("Category", "categories")
            .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary())
            .with_column(ColumnMetadata::plain("name", ColumnType::String)),
        ModelMetadata::new("ProductCategory", "product_categories")
            .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary())
            .with_column(ColumnMetadata::belongs_to("product", "Product").name("product_id"))
            .with_column(ColumnMetadata::belongs_to("category", "Category").name("category_id")),
        ModelMetadata::new("Folder", "folders")
            .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary())
            .with_column(ColumnMetadata::plain("name", ColumnType::String))
            .with_column(ColumnMetadata::belongs_to("parent", "Folder").name("parent_id"))
            .with_column(ColumnMetadata::collection("children", "Folder", "parent")),
        ModelMetadata::new("Country", "countries")
            .readonly()
            .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary())
            .with_column(ColumnMetadata::plain("name", ColumnType::String)),
        ModelMetadata::new("Ticket", "tickets")
            .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary())
            .with_column(ColumnMetadata::plain("code", ColumnType::String).defaults_to_fn(
                move || {
                    let n = codes.fetch_add(1, Ordering::SeqCst) + 1;
                    Value::String(format!("c{n}"))
                },
            ))
            .with_column(ColumnMetadata::plain("status", ColumnType::String).defaults_to("open")),
        ModelMetadata::new("Note", "notes")
            .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary())
            .with_column(ColumnMetadata::plain("title", ColumnType::String))
            .with_column(ColumnMetadata::plain("slug", ColumnType::String))
            .with_column(ColumnMetadata::plain("edited", ColumnType::Boolean)),
    ];

    let mut registry = Registry::new();
    for model in models {
        registry.register(model).unwrap();
    }
    registry
}

pub fn setup() -> (Arc<MockPool>, Orm) {
    let pool = MockPool::new();
    let orm = Orm::initialize(registry(), OrmConfig::new(pool.clone() as PoolRef)).unwrap();
    (pool, orm)
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

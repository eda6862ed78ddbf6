use super::*;
use crate::metadata::{ColumnMetadata, ColumnType, ModelMetadata, Registry};
use crate::predicate::{CompareOp, Predicate, WhereQuery};
use crate::record::Record;
use crate::sort::Sort;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn registry() -> Registry {
    let token_counter = Arc::new(AtomicUsize::new(0));
    Registry::new()
        .with(
            ModelMetadata::new("Store", "stores")
                .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary())
                .with_column(ColumnMetadata::plain("name", ColumnType::String))
                .with_column(ColumnMetadata::collection("products", "Product", "store")),
        )
        .and_then(|r| {
            r.with(
                ModelMetadata::new("Product", "products")
                    .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary())
                    .with_column(ColumnMetadata::plain("name", ColumnType::String))
                    .with_column(
                        ColumnMetadata::plain("aliases", ColumnType::StringArray)
                            .name("alias_names"),
                    )
                    .with_column(ColumnMetadata::belongs_to("store", "Store").name("store_id"))
                    .with_column(ColumnMetadata::plain("price", ColumnType::Float))
                    .with_column(ColumnMetadata::plain("meta", ColumnType::Json))
                    .with_column(
                        ColumnMetadata::collection("categories", "Category", "product")
                            .through("ProductCategory"),
                    ),
            )
        })
        .and_then(|r| {
            r.with(
                ModelMetadata::new("Widget", "widgets")
                    .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary())
                    .with_column(
                        ColumnMetadata::plain("label", ColumnType::String).defaults_to("untitled"),
                    )
                    .with_column(ColumnMetadata::plain("token", ColumnType::String).defaults_to_fn(
                        move || {
                            let n = token_counter.fetch_add(1, Ordering::SeqCst) + 1;
                            Value::String(format!("t{n}"))
                        },
                    ))
                    .with_column(
                        ColumnMetadata::plain("createdAt", ColumnType::Datetime)
                            .name("created_at")
                            .create_date(),
                    )
                    .with_column(
                        ColumnMetadata::plain("updatedAt", ColumnType::Datetime)
                            .name("updated_at")
                            .update_date(),
                    )
                    .with_column(ColumnMetadata::plain("version", ColumnType::Integer).version()),
            )
        })
        .and_then(|r| {
            r.with(
                ModelMetadata::new("Tag", "tags")
                    .with_column(ColumnMetadata::plain("id", ColumnType::Integer).primary()),
            )
        })
        .unwrap()
}

fn compile(model: &str, query: Value) -> (String, Vec<Value>) {
    let registry = registry();
    let model = registry.get(model).unwrap();
    build_where(&model, &registry, &WhereQuery::from_json(query).unwrap()).unwrap()
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

// ==================== WHERE ====================

#[test]
fn array_membership_uses_any_with_cast() {
    let (sql, params) = compile("Product", json!({ "id": [1, 2, 3] }));
    assert_eq!(sql, r#""id"=ANY($1::INTEGER[])"#);
    assert_eq!(params, vec![json!([1, 2, 3])]);
}

#[test]
fn or_groups_are_parenthesised() {
    let (sql, params) = compile("Product", json!({ "or": [{ "name": "a" }, { "store": 2 }] }));
    assert_eq!(sql, r#"(("name"=$1) OR ("store_id"=$2))"#);
    assert_eq!(params, vec![json!("a"), json!(2)]);
}

#[test]
fn or_group_ands_with_siblings() {
    let query = WhereQuery::new()
        .eq("price", 5)
        .or([WhereQuery::new().eq("name", "a"), WhereQuery::new().is_null("store")]);
    let registry = registry();
    let model = registry.get("Product").unwrap();
    let (sql, params) = build_where(&model, &registry, &query).unwrap();
    assert_eq!(sql, r#""price"=$1 AND (("name"=$2) OR ("store_id" IS NULL))"#);
    assert_eq!(params, vec![json!(5), json!("a")]);
}

#[test]
fn compilation_is_deterministic() {
    let query = json!({ "name": { "like": ["a%", "b%"] }, "id": [1, 2], "store": null });
    let first = compile("Product", query.clone());
    for _ in 0..5 {
        assert_eq!(compile("Product", query.clone()), first);
    }
}

#[test]
fn clauses_compile_in_written_order() {
    let (sql, params) = compile("Product", json!({ "name": "a", "id": 1 }));
    assert_eq!(sql, r#""name"=$1 AND "id"=$2"#);
    assert_eq!(params, vec![json!("a"), json!(1)]);

    let (sql, params) = compile("Product", json!({ "price": { ">": 1, "<=": 5 } }));
    assert_eq!(sql, r#"("price">$1 AND "price"<=$2)"#);
    assert_eq!(params, vec![json!(1), json!(5)]);
}

#[test]
fn null_and_negated_null() {
    assert_eq!(compile("Product", json!({ "store": null })).0, r#""store_id" IS NULL"#);
    assert_eq!(
        compile("Product", json!({ "name": { "!": null } })).0,
        r#""name" IS NOT NULL"#
    );
}

#[test]
fn negated_scalar_and_list() {
    let (sql, params) = compile("Product", json!({ "name": { "!": "x" } }));
    assert_eq!(sql, r#""name"<>$1"#);
    assert_eq!(params, vec![json!("x")]);

    let (sql, params) = compile("Product", json!({ "id": { "!": [1, 2] } }));
    assert_eq!(sql, r#""id"<>ALL($1::INTEGER[])"#);
    assert_eq!(params, vec![json!([1, 2])]);
}

#[test]
fn list_edge_cases() {
    assert_eq!(compile("Product", json!({ "id": [] })), ("1<>1".to_string(), vec![]));
    assert_eq!(compile("Product", json!({ "id": { "!": [] } })).0, "1=1");
    assert_eq!(
        compile("Product", json!({ "id": [7] })),
        (r#""id"=$1"#.to_string(), vec![json!(7)])
    );

    let (sql, params) = compile("Product", json!({ "id": [1, null, 2] }));
    assert_eq!(sql, r#"("id" IS NULL OR "id"=ANY($1::INTEGER[]))"#);
    assert_eq!(params, vec![json!([1, 2])]);

    let (sql, _) = compile("Product", json!({ "id": { "!": [1, null, 2] } }));
    assert_eq!(sql, r#"("id" IS NOT NULL AND "id"<>ALL($1::INTEGER[]))"#);

    assert_eq!(compile("Product", json!({ "id": [null] })).0, r#""id" IS NULL"#);
}

#[test]
fn like_variants() {
    let (sql, params) = compile("Product", json!({ "name": { "like": "%a%" } }));
    assert_eq!(sql, r#""name" ILIKE $1"#);
    assert_eq!(params, vec![json!("%a%")]);

    let (sql, params) = compile("Product", json!({ "name": { "like": ["a%", "b%"] } }));
    assert_eq!(sql, r#"("name" ILIKE $1 OR "name" ILIKE $2)"#);
    assert_eq!(params, vec![json!("a%"), json!("b%")]);

    let (sql, params) = compile("Product", json!({ "name": { "!": { "like": ["a%", null] } } }));
    assert_eq!(sql, r#""name" NOT ILIKE $1 AND "name" IS NOT NULL"#);
    assert_eq!(params, vec![json!("a%")]);

    let (_, params) = compile("Product", json!({ "name": { "startsWith": "ab" } }));
    assert_eq!(params, vec![json!("ab%")]);
    let (_, params) = compile("Product", json!({ "name": { "endsWith": "ab" } }));
    assert_eq!(params, vec![json!("%ab")]);
    let (_, params) = compile("Product", json!({ "name": { "contains": "ab" } }));
    assert_eq!(params, vec![json!("%ab%")]);
}

#[test]
fn array_column_forms() {
    let (sql, params) = compile("Product", json!({ "aliases": "x" }));
    assert_eq!(sql, r#"$1=ANY("alias_names")"#);
    assert_eq!(params, vec![json!("x")]);

    assert_eq!(
        compile("Product", json!({ "aliases": { "!": "x" } })).0,
        r#"$1<>ALL("alias_names")"#
    );

    let (sql, params) = compile("Product", json!({ "aliases": ["x", "y"] }));
    assert_eq!(sql, r#""alias_names"&&$1::TEXT[]"#);
    assert_eq!(params, vec![json!(["x", "y"])]);

    assert_eq!(
        compile("Product", json!({ "aliases": { "!": ["x", "y"] } })).0,
        r#"NOT "alias_names"&&$1::TEXT[]"#
    );
}

#[test]
fn array_column_like_unnests() {
    let (sql, params) = compile("Product", json!({ "aliases": { "like": "%x%" } }));
    assert_eq!(
        sql,
        r#"EXISTS(SELECT 1 FROM unnest("alias_names") AS "unnest_alias_names" WHERE "unnest_alias_names" ILIKE $1)"#
    );
    assert_eq!(params, vec![json!("%x%")]);

    let (sql, params) = compile("Product", json!({ "aliases": { "!": { "like": ["a%", "b%"] } } }));
    assert_eq!(
        sql,
        r#"NOT EXISTS(SELECT 1 FROM unnest("alias_names") AS "unnest_alias_names" WHERE "unnest_alias_names" ILIKE ANY($1::TEXT[]))"#
    );
    assert_eq!(params, vec![json!(["a%", "b%"])]);
}

#[test]
fn entity_values_reduce_to_primary_key() {
    let (sql, params) = compile("Product", json!({ "store": { "id": 5, "name": "Main" } }));
    assert_eq!(sql, r#""store_id"=$1"#);
    assert_eq!(params, vec![json!(5)]);

    let (sql, params) = compile("Product", json!({ "store": [{ "id": 1 }, { "id": 2 }] }));
    assert_eq!(sql, r#""store_id"=ANY($1::INTEGER[])"#);
    assert_eq!(params, vec![json!([1, 2])]);

    let (_, params) = compile("Product", json!({ "id": { "id": 3 } }));
    assert_eq!(params, vec![json!(3)]);
}

#[test]
fn json_columns_keep_objects() {
    let (sql, params) = compile("Product", json!({ "meta": { "id": 1, "k": "v" } }));
    assert_eq!(sql, r#""meta"=$1"#);
    assert_eq!(params, vec![json!({ "id": 1, "k": "v" })]);
}

#[test]
fn comparisons_and_negation() {
    let registry = registry();
    let model = registry.get("Product").unwrap();
    let query = WhereQuery::new().gte("price", 10).lt("price", 20);
    let (sql, params) = build_where(&model, &registry, &query).unwrap();
    assert_eq!(sql, r#""price">=$1 AND "price"<$2"#);
    assert_eq!(params, vec![json!(10), json!(20)]);

    assert_eq!(
        compile("Product", json!({ "price": { "!": { "<": 5 } } })).0,
        r#""price">=$1"#
    );

    let between = Predicate::AllOf(vec![
        Predicate::Compare(CompareOp::Gt, json!(1)),
        Predicate::Compare(CompareOp::Lt, json!(9)),
    ]);
    let query = WhereQuery::new().predicate("price", between.clone());
    assert_eq!(
        build_where(&model, &registry, &query).unwrap().0,
        r#"("price">$1 AND "price"<$2)"#
    );
    let query = WhereQuery::new().predicate("price", between.not());
    assert_eq!(
        build_where(&model, &registry, &query).unwrap().0,
        r#"("price"<=$1 OR "price">=$2)"#
    );
}

#[test]
fn unknown_property_is_a_query_error() {
    let registry = registry();
    let model = registry.get("Product").unwrap();
    let err = build_where(&model, &registry, &WhereQuery::new().eq("nope", 1)).unwrap_err();
    assert!(err.is_query());
    let msg = err.to_string();
    assert!(msg.contains("`Product`"));
    assert!(msg.contains(r#"{"nope":1}"#));
}

#[test]
fn collection_property_is_a_query_error() {
    let registry = registry();
    let model = registry.get("Product").unwrap();
    let err = build_where(&model, &registry, &WhereQuery::new().eq("categories", 1)).unwrap_err();
    assert!(err.is_query());
    assert!(err.to_string().contains("categories"));
}

#[test]
fn empty_where_compiles_to_nothing() {
    assert_eq!(compile("Product", json!({})), (String::new(), vec![]));
}

// ==================== SELECT / COUNT ====================

#[test]
fn default_select_aliases_and_skips_collections() {
    let registry = registry();
    let model = registry.get("Product").unwrap();
    let stmt = build_select(&model, &registry, &SelectPlan::default()).unwrap();
    assert_eq!(
        stmt.sql,
        r#"SELECT "id","name","alias_names" AS "aliases","store_id" AS "store","price","meta" FROM "products""#
    );
    assert!(stmt.params.is_empty());
}

#[test]
fn select_with_all_directives() {
    let registry = registry();
    let model = registry.get("Product").unwrap();
    let plan = SelectPlan {
        select: Some(vec!["name".into(), "categories".into()]),
        where_: WhereQuery::new().eq("store", 1),
        sorts: vec![Sort::asc("name"), Sort::desc("id")],
        skip: 20,
        limit: 10,
    };
    let stmt = build_select(&model, &registry, &plan).unwrap();
    assert_eq!(
        stmt.sql,
        r#"SELECT "name","id" FROM "products" WHERE "store_id"=$1 ORDER BY "name","id" DESC LIMIT 10 OFFSET 20"#
    );
    assert_eq!(stmt.params, vec![json!(1)]);
}

#[test]
fn select_rejects_unknown_properties_and_sorts() {
    let registry = registry();
    let model = registry.get("Product").unwrap();
    let plan = SelectPlan {
        select: Some(vec!["nope".into()]),
        ..Default::default()
    };
    assert!(build_select(&model, &registry, &plan).unwrap_err().is_query());

    let plan = SelectPlan {
        sorts: vec![Sort::asc("categories")],
        ..Default::default()
    };
    assert!(build_select(&model, &registry, &plan).unwrap_err().is_query());
}

#[test]
fn count_statement() {
    let registry = registry();
    let model = registry.get("Product").unwrap();
    let stmt = build_count(&model, &registry, &WhereQuery::new().like("name", "%a%")).unwrap();
    assert_eq!(stmt.sql, r#"SELECT count(*) AS "count" FROM "products" WHERE "name" ILIKE $1"#);
    assert_eq!(stmt.params, vec![json!("%a%")]);
}

// ==================== INSERT ====================

#[test]
fn insert_is_column_major_with_default_gaps() {
    let registry = registry();
    let model = registry.get("Product").unwrap();
    let records = vec![
        record(json!({ "name": "a", "store": 1 })),
        record(json!({ "name": "b", "price": 2 })),
    ];
    let stmt = build_insert(&model, &registry, &records, &ReturnColumns::Nothing).unwrap();
    assert_eq!(
        stmt.sql,
        r#"INSERT INTO "products" ("name","store_id","price") VALUES ($1,$3,DEFAULT),($2,DEFAULT,$4)"#
    );
    assert_eq!(stmt.params, vec![json!("a"), json!("b"), json!(1), json!(2)]);
}

#[test]
fn insert_reduces_entities_and_strips_collections() {
    let registry = registry();
    let model = registry.get("Product").unwrap();
    let records = vec![record(json!({
        "name": "a",
        "store": { "id": 9, "name": "s" },
        "categories": [{ "id": 1 }],
        "unknown": true,
    }))];
    let stmt = build_insert(&model, &registry, &records, &ReturnColumns::Select(vec![])).unwrap();
    assert_eq!(
        stmt.sql,
        r#"INSERT INTO "products" ("name","store_id") VALUES ($1,$2) RETURNING "id""#
    );
    assert_eq!(stmt.params, vec![json!("a"), json!(9)]);
}

#[test]
fn insert_returning_all_columns() {
    let registry = registry();
    let model = registry.get("Store").unwrap();
    let stmt = build_insert(
        &model,
        &registry,
        &[record(json!({ "name": "s" }))],
        &ReturnColumns::All,
    )
    .unwrap();
    assert_eq!(stmt.sql, r#"INSERT INTO "stores" ("name") VALUES ($1) RETURNING "id","name""#);
}

#[test]
fn insert_without_columns_uses_default_rows() {
    let registry = registry();
    let model = registry.get("Tag").unwrap();
    let stmt = build_insert(
        &model,
        &registry,
        &[Record::new(), Record::new()],
        &ReturnColumns::Nothing,
    )
    .unwrap();
    assert_eq!(stmt.sql, r#"INSERT INTO "tags" ("id") VALUES (DEFAULT),(DEFAULT)"#);
    assert!(stmt.params.is_empty());
}

#[test]
fn insert_defaults_are_resolved_per_record() {
    let registry = registry();
    let model = registry.get("Widget").unwrap();
    let stmt = build_insert(
        &model,
        &registry,
        &[Record::new(), Record::new()],
        &ReturnColumns::Nothing,
    )
    .unwrap();
    assert_eq!(
        stmt.sql,
        r#"INSERT INTO "widgets" ("label","token","created_at","updated_at","version") VALUES ($1,$3,$5,$7,$9),($2,$4,$6,$8,$10)"#
    );
    assert_eq!(stmt.params[0], json!("untitled"));
    assert_eq!(stmt.params[1], json!("untitled"));
    assert_eq!(stmt.params[2], json!("t1"));
    assert_eq!(stmt.params[3], json!("t2"));
    assert!(stmt.params[4].is_string());
    assert_eq!(stmt.params[8], json!(1));
    assert_eq!(stmt.params[9], json!(1));
}

#[test]
fn insert_keeps_explicit_values_over_defaults() {
    let registry = registry();
    let model = registry.get("Widget").unwrap();
    let stmt = build_insert(
        &model,
        &registry,
        &[record(json!({ "label": "mine", "token": null }))],
        &ReturnColumns::Nothing,
    )
    .unwrap();
    assert_eq!(stmt.params[0], json!("mine"));
    assert_eq!(stmt.params[1], Value::Null);
}

#[test]
fn insert_of_zero_records_is_rejected() {
    let registry = registry();
    let model = registry.get("Tag").unwrap();
    assert!(build_insert(&model, &registry, &[], &ReturnColumns::Nothing).is_err());
}

// ==================== UPDATE / DELETE ====================

#[test]
fn update_numbers_set_before_where() {
    let registry = registry();
    let model = registry.get("Product").unwrap();
    let stmt = build_update(
        &model,
        &registry,
        &WhereQuery::new().eq("id", 5),
        &record(json!({ "name": "n", "store": { "id": 2 } })),
        &ReturnColumns::All,
    )
    .unwrap();
    assert_eq!(
        stmt.sql,
        r#"UPDATE "products" SET "name"=$1,"store_id"=$2 WHERE "id"=$3 RETURNING "id","name","alias_names" AS "aliases","store_id" AS "store","price","meta""#
    );
    assert_eq!(stmt.params, vec![json!("n"), json!(2), json!(5)]);
}

#[test]
fn update_refreshes_timestamps_and_bumps_version() {
    let registry = registry();
    let model = registry.get("Widget").unwrap();
    let stmt = build_update(
        &model,
        &registry,
        &WhereQuery::new().eq("id", 1),
        &record(json!({ "label": "x" })),
        &ReturnColumns::Nothing,
    )
    .unwrap();
    assert_eq!(
        stmt.sql,
        r#"UPDATE "widgets" SET "label"=$1,"updated_at"=$2,"version"="version"+1 WHERE "id"=$3"#
    );
    assert_eq!(stmt.params.len(), 3);
}

#[test]
fn update_without_assignments_is_rejected() {
    let registry = registry();
    let model = registry.get("Product").unwrap();
    let err = build_update(
        &model,
        &registry,
        &WhereQuery::new(),
        &record(json!({ "unknown": 1 })),
        &ReturnColumns::Nothing,
    )
    .unwrap_err();
    assert!(err.is_query());
}

#[test]
fn delete_statements() {
    let registry = registry();
    let model = registry.get("Product").unwrap();
    let stmt =
        build_delete(&model, &registry, &WhereQuery::new(), &ReturnColumns::Nothing).unwrap();
    assert_eq!(stmt.sql, r#"DELETE FROM "products""#);

    let stmt = build_delete(
        &model,
        &registry,
        &WhereQuery::new().eq("id", 3),
        &ReturnColumns::Select(vec![]),
    )
    .unwrap();
    assert_eq!(stmt.sql, r#"DELETE FROM "products" WHERE "id"=$1 RETURNING "id""#);
    assert_eq!(stmt.params, vec![json!(3)]);
}

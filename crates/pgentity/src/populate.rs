//! Relation population.
//!
//! Each requested relation is one stage, run after the base rows are hydrated.
//! A stage issues a single batched follow-up query per model involved (two for
//! many-to-many: junction, then target) and merges the results back onto the
//! base records. Stages run sequentially and never depend on each other.

use crate::error::{OrmError, OrmResult};
use crate::hydrate::hydrate_rows;
use crate::log::populate_trace;
use crate::metadata::{ColumnKind, ModelMetadata, Registry};
use crate::pool::PoolRef;
use crate::predicate::WhereQuery;
use crate::query::{Directives, execute, impl_select_methods, impl_where_methods};
use crate::record::{Record, key_of};
use crate::repository::RepoCore;
use crate::sql::build_select;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Directives applied to the follow-up query of one relation.
///
/// ```ignore
/// repo.find()
///     .populate_with(
///         "products",
///         PopulateOptions::new().where_json(json!({ "price": { ">": 10 } })).sort("name"),
///     )
///     .await?;
/// ```
#[derive(Clone, Default)]
pub struct PopulateOptions {
    directives: Directives,
}

impl PopulateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    impl_where_methods!();
    impl_select_methods!();
}

/// One `populate(name, options)` call.
#[derive(Clone)]
pub(crate) struct PopulateRequest {
    pub property: String,
    pub options: PopulateOptions,
}

impl PopulateRequest {
    pub fn new(property: &str, options: PopulateOptions) -> Self {
        Self {
            property: property.to_string(),
            options,
        }
    }
}

/// A validated population stage.
pub(crate) enum Stage {
    BelongsTo {
        target: Arc<ModelMetadata>,
    },
    HasMany {
        target: Arc<ModelMetadata>,
        via: String,
    },
    ManyToMany {
        target: Arc<ModelMetadata>,
        junction: Arc<ModelMetadata>,
        via: String,
        other: String,
    },
}

pub(crate) struct PlannedStage<'a> {
    request: &'a PopulateRequest,
    stage: Stage,
}

/// Check every request against the metadata before any statement is sent.
pub(crate) fn plan<'a>(
    core: &RepoCore,
    base_select: Option<&[String]>,
    requests: &'a [PopulateRequest],
) -> OrmResult<Vec<PlannedStage<'a>>> {
    requests
        .iter()
        .map(|request| {
            Ok(PlannedStage {
                request,
                stage: plan_one(core, base_select, request)?,
            })
        })
        .collect()
}

fn plan_one(
    core: &RepoCore,
    base_select: Option<&[String]>,
    request: &PopulateRequest,
) -> OrmResult<Stage> {
    let model = &core.model;
    let registry = &core.registry;
    let property = request.property.as_str();
    let selected = |prop: &str| base_select.is_none_or(|sel| sel.iter().any(|p| p == prop));

    let column = model.column(property).ok_or_else(|| {
        OrmError::query(model.name(), format!("cannot populate unknown property `{property}`"))
    })?;

    match &column.kind {
        ColumnKind::Plain { .. } => Err(OrmError::query(
            model.name(),
            format!("cannot populate `{property}`: it is not a relation"),
        )),
        ColumnKind::BelongsTo { .. } => {
            let target = registry.relation_target(model, column)?;
            if !selected(property) {
                return Err(OrmError::query(
                    model.name(),
                    format!(
                        "cannot populate `{property}`: column `{}` is not selected",
                        column.name
                    ),
                ));
            }
            check_options(registry, &target, &request.options.directives)?;
            Ok(Stage::BelongsTo { target })
        }
        ColumnKind::Collection { via, through, .. } => {
            let target = registry.relation_target(model, column)?;
            check_options(registry, &target, &request.options.directives)?;

            let Some(through) = through else {
                let via_column = target.column(via).ok_or_else(|| {
                    OrmError::configuration(format!(
                        "`{}.{property}` points at `{}.{via}`, which does not exist",
                        model.name(),
                        target.name()
                    ))
                })?;
                let self_reference = target.name().eq_ignore_ascii_case(model.name());
                if self_reference && !selected(via) {
                    return Err(OrmError::query(
                        model.name(),
                        format!(
                            "cannot populate self-referencing `{property}`: \
                             column `{}` (property `{via}`) is not selected",
                            via_column.name
                        ),
                    ));
                }
                return Ok(Stage::HasMany {
                    target,
                    via: via.clone(),
                });
            };

            let junction = registry.resolve(through)?;
            if junction.column(via).is_none_or(|c| !c.is_belongs_to()) {
                return Err(OrmError::configuration(format!(
                    "junction `{}` has no belongs-to property `{via}` for `{}.{property}`",
                    junction.name(),
                    model.name()
                )));
            }
            let other = junction
                .columns()
                .iter()
                .filter(|c| c.is_belongs_to() && c.property_name != *via)
                .find(|c| {
                    registry
                        .relation_target(&junction, c)
                        .is_ok_and(|t| t.name() == target.name())
                })
                .ok_or_else(|| {
                    OrmError::configuration(format!(
                        "junction `{}` has no belongs-to column pointing at `{}`",
                        junction.name(),
                        target.name()
                    ))
                })?;
            Ok(Stage::ManyToMany {
                other: other.property_name.clone(),
                target,
                junction,
                via: via.clone(),
            })
        }
    }
}

/// Compile the options against the target once so mistakes surface before
/// the base query is sent.
fn check_options(
    registry: &Registry,
    target: &ModelMetadata,
    options: &Directives,
) -> OrmResult<()> {
    options.validate(target)?;
    build_select(target, registry, &options.plan()).map(|_| ())
}

/// Run every planned stage against `records`.
///
/// Stages without their own pool use `base_pool`.
pub(crate) async fn resolve(
    core: &RepoCore,
    base_pool: &PoolRef,
    stages: Vec<PlannedStage<'_>>,
    records: &mut [Record],
) -> OrmResult<()> {
    for PlannedStage { request, stage } in stages {
        let options = &request.options.directives;
        let pool = options.pool.as_ref().unwrap_or(base_pool);
        let property = request.property.as_str();
        match stage {
            Stage::BelongsTo { target } => {
                belongs_to(core, pool, property, &target, options, records).await?
            }
            Stage::HasMany { target, via } => {
                has_many(core, pool, property, &target, &via, options, records).await?
            }
            Stage::ManyToMany {
                target,
                junction,
                via,
                other,
            } => {
                let link = Link {
                    junction: &junction,
                    via: &via,
                    other: &other,
                };
                many_to_many(core, pool, property, &target, link, options, records).await?
            }
        }
    }
    Ok(())
}

/// Distinct non-null values in first-seen order.
fn distinct<'a>(values: impl Iterator<Item = Option<&'a Value>>) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values.flatten() {
        if let Some(key) = key_of(value)
            && seen.insert(key)
        {
            out.push(value.clone());
        }
    }
    out
}

/// Primary-key value of a (possibly already populated) relation value.
fn reference_key(value: &Value, pk: &str) -> Option<String> {
    match value {
        Value::Object(map) => map.get(pk).and_then(key_of),
        other => key_of(other),
    }
}

async fn fetch(
    core: &RepoCore,
    pool: &PoolRef,
    target: &ModelMetadata,
    options: &Directives,
    key_filter: WhereQuery,
    extra_select: Option<&str>,
) -> OrmResult<Vec<Record>> {
    let mut plan = options.plan();
    plan.where_ = key_filter.and_where(options.where_.clone());
    if let (Some(select), Some(extra)) = (plan.select.as_mut(), extra_select)
        && !select.iter().any(|p| p == extra)
    {
        select.push(extra.to_string());
    }
    let stmt = build_select(target, &core.registry, &plan)?;
    let rows = execute(core, target, pool, "populate", stmt).await?;
    hydrate_rows(target, rows)
}

async fn belongs_to(
    core: &RepoCore,
    pool: &PoolRef,
    property: &str,
    target: &ModelMetadata,
    options: &Directives,
    records: &mut [Record],
) -> OrmResult<()> {
    let pk = target.require_primary_key()?.property_name.clone();
    let keys = distinct(records.iter().map(|r| {
        r.get(property).map(|v| match v {
            Value::Object(map) => map.get(&pk).unwrap_or(&Value::Null),
            other => other,
        })
    }));
    populate_trace!(
        model = core.model.name(),
        relation = property,
        kind = "belongs_to",
        keys = keys.len()
    );
    if keys.is_empty() {
        return Ok(());
    }

    let rows = fetch(core, pool, target, options, WhereQuery::new().is_in(&pk, keys), None).await?;
    let by_key: HashMap<String, Record> = rows
        .into_iter()
        .filter_map(|row| row.get(&pk).and_then(key_of).map(|k| (k, row)))
        .collect();

    for record in records.iter_mut() {
        let Some(key) = record.get(property).and_then(|v| reference_key(v, &pk)) else {
            continue;
        };
        match by_key.get(&key) {
            Some(found) => {
                record.insert(property.to_string(), Value::Object(found.clone()));
            }
            None => {
                record.remove(property);
            }
        }
    }
    Ok(())
}

async fn has_many(
    core: &RepoCore,
    pool: &PoolRef,
    property: &str,
    target: &ModelMetadata,
    via: &str,
    options: &Directives,
    records: &mut [Record],
) -> OrmResult<()> {
    let pk = core.model.require_primary_key()?.property_name.clone();
    let ids = distinct(records.iter().map(|r| r.get(&pk)));
    populate_trace!(
        model = core.model.name(),
        relation = property,
        kind = "has_many",
        keys = ids.len()
    );

    let mut groups: HashMap<String, Vec<Value>> = HashMap::new();
    if !ids.is_empty() {
        let rows = fetch(core, pool, target, options, WhereQuery::new().is_in(via, ids), Some(via))
            .await?;
        for row in rows {
            if let Some(key) = row.get(via).and_then(|v| reference_key(v, &pk)) {
                groups.entry(key).or_default().push(Value::Object(row));
            }
        }
    }

    for record in records.iter_mut() {
        let children = record
            .get(&pk)
            .and_then(key_of)
            .and_then(|k| groups.get(&k).cloned())
            .unwrap_or_default();
        record.insert(property.to_string(), Value::Array(children));
    }
    Ok(())
}

/// Junction side of a many-to-many relation.
struct Link<'a> {
    junction: &'a ModelMetadata,
    /// Junction property pointing at the owning model.
    via: &'a str,
    /// Junction property pointing at the target model.
    other: &'a str,
}

async fn many_to_many(
    core: &RepoCore,
    pool: &PoolRef,
    property: &str,
    target: &ModelMetadata,
    link: Link<'_>,
    options: &Directives,
    records: &mut [Record],
) -> OrmResult<()> {
    let pk = core.model.require_primary_key()?.property_name.clone();
    let target_pk = target.require_primary_key()?.property_name.clone();
    let ids = distinct(records.iter().map(|r| r.get(&pk)));
    populate_trace!(
        model = core.model.name(),
        relation = property,
        kind = "many_to_many",
        keys = ids.len()
    );

    // base key -> target keys, in junction order
    let mut links: HashMap<String, Vec<String>> = HashMap::new();
    let mut by_key: HashMap<String, Record> = HashMap::new();
    let mut target_order: Vec<String> = Vec::new();

    if !ids.is_empty() {
        let junction_query = Directives {
            select: Some(vec![link.via.to_string(), link.other.to_string()]),
            ..Directives::default()
        };
        let junction_rows = fetch(
            core,
            pool,
            link.junction,
            &junction_query,
            WhereQuery::new().is_in(link.via, ids),
            None,
        )
        .await?;

        let other_ids = distinct(junction_rows.iter().map(|r| r.get(link.other)));
        for row in &junction_rows {
            let owner = row.get(link.via).and_then(|v| reference_key(v, &pk));
            let other = row.get(link.other).and_then(|v| reference_key(v, &target_pk));
            if let (Some(owner), Some(other)) = (owner, other) {
                links.entry(owner).or_default().push(other);
            }
        }

        if !other_ids.is_empty() {
            let rows = fetch(
                core,
                pool,
                target,
                options,
                WhereQuery::new().is_in(&target_pk, other_ids),
                None,
            )
            .await?;
            for row in rows {
                if let Some(key) = row.get(&target_pk).and_then(key_of) {
                    target_order.push(key.clone());
                    by_key.insert(key, row);
                }
            }
        }
    }

    let sorted = !options.sorts.is_empty();
    for record in records.iter_mut() {
        let linked = record
            .get(&pk)
            .and_then(key_of)
            .and_then(|k| links.get(&k))
            .map(Vec::as_slice)
            .unwrap_or_default();

        let items: Vec<Value> = if sorted {
            let wanted: HashSet<&String> = linked.iter().collect();
            target_order
                .iter()
                .filter(|k| wanted.contains(k))
                .filter_map(|k| by_key.get(k))
                .map(|r| Value::Object(r.clone()))
                .collect()
        } else {
            linked
                .iter()
                .filter_map(|k| by_key.get(k))
                .map(|r| Value::Object(r.clone()))
                .collect()
        };
        record.insert(property.to_string(), Value::Array(items));
    }
    Ok(())
}

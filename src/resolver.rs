// src/resolver.rs
//! Column naming for a selected record.
//!
//! Record fields are positional: the Nth schema field (ascending by id)
//! names element slot N of every record under that schema. Anything that
//! stops the join from happening (other entity types, no owning schema,
//! fetch failure, a schema without field children) falls back to generic
//! `Element {id} ({dataType})` names. Nothing here ever fails.
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::GatewayError;
use crate::model::{EntityDetail, EntityType, NodeId};
use crate::value::Value;

pub const ID_COLUMN: &str = "_id";
pub const ACTIONS_COLUMN: &str = "_actions";

/// Element slot holding a schema field's name.
const FIELD_NAME_SLOT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub key: String,
    pub name: String,
    pub element_id: Option<u32>,
}

pub type Row = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTable {
    pub entity_id: NodeId,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl ResolvedTable {
    /// Data columns only (no `_id` / `_actions`).
    pub fn element_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.element_id.is_some())
    }

    pub fn cell(&self, row: usize, key: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(key))
    }

    /// Display names and stringified cells of every non-actions column.
    pub fn to_grid(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let cols: Vec<&Column> = self
            .columns
            .iter()
            .filter(|c| c.key != ACTIONS_COLUMN)
            .collect();
        let headers = cols.iter().map(|c| c.name.clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                cols.iter()
                    .map(|c| row.get(&c.key).map(Value::to_string).unwrap_or_default())
                    .collect()
            })
            .collect();
        (headers, rows)
    }
}

pub fn element_key(element_id: u32) -> String {
    format!("element_{element_id}")
}

pub fn generic_column_name(element_id: u32, data_type: &str) -> String {
    format!("Element {element_id} ({data_type})")
}

/// Anything that can hand out entity details by id.
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn entity(&self, id: NodeId) -> Result<EntityDetail, GatewayError>;
}

/// Slot → field name map from a schema record, or `None` when the schema
/// has no schema-field children to join against.
pub fn schema_field_names(schema: &EntityDetail) -> Option<BTreeMap<u32, String>> {
    let mut fields: Vec<&EntityDetail> = schema
        .children
        .as_deref()?
        .iter()
        .filter(|c| c.entity_type == EntityType::SchemaField)
        .collect();
    if fields.is_empty() {
        return None;
    }
    fields.sort_by_key(|f| f.id);

    let names = fields
        .iter()
        .zip(1u32..)
        .filter_map(|(field, slot)| {
            let name = field.value(FIELD_NAME_SLOT)?.to_string();
            (!name.is_empty()).then_some((slot, name))
        })
        .collect();
    Some(names)
}

/// Build the one-row table for `record`, naming columns from `names` where
/// a slot has an entry.
pub fn build_table(record: &EntityDetail, names: Option<&BTreeMap<u32, String>>) -> ResolvedTable {
    let mut columns = Vec::with_capacity(record.values.len() + 2);
    let mut row = Row::new();

    columns.push(Column {
        key: ID_COLUMN.to_string(),
        name: "ID".to_string(),
        element_id: None,
    });
    row.insert(ID_COLUMN.to_string(), Value::Integer(record.id));

    for (element_id, element) in &record.values {
        let key = element_key(*element_id);
        let name = names
            .and_then(|n| n.get(element_id))
            .cloned()
            .unwrap_or_else(|| generic_column_name(*element_id, &element.data_type));
        columns.push(Column {
            key: key.clone(),
            name,
            element_id: Some(*element_id),
        });
        row.insert(key, element.value.clone());
    }

    columns.push(Column {
        key: ACTIONS_COLUMN.to_string(),
        name: "Actions".to_string(),
        element_id: None,
    });
    row.insert(ACTIONS_COLUMN.to_string(), Value::Null);

    ResolvedTable {
        entity_id: record.id,
        columns,
        rows: vec![row],
    }
}

/// Resolve column names for `record`, fetching its schema when needed.
pub async fn resolve<S>(source: &S, record: &EntityDetail) -> ResolvedTable
where
    S: DetailSource + ?Sized,
{
    let schema_id = match (record.entity_type, record.owning_schema()) {
        (EntityType::Record, Some(id)) => id,
        _ => return build_table(record, None),
    };

    match source.entity(schema_id).await {
        Ok(schema) => {
            let names = schema_field_names(&schema);
            if names.is_none() {
                log::debug!("[RESOLVE] schema {schema_id} has no field children; generic names");
            }
            build_table(record, names.as_ref())
        }
        Err(e) => {
            log::debug!("[RESOLVE] schema {schema_id} fetch failed ({e}); generic names");
            build_table(record, None)
        }
    }
}

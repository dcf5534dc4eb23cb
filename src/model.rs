// src/model.rs
//! Wire records and the in-memory data model.
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::DataModelError;
use crate::value::{RawElementValue, Value};

pub type NodeId = i64;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum EntityType {
    /// Folder-like grouping node (BusinessObject on the server).
    Container,
    /// Field-layout definition (Profile on the server).
    Schema,
    /// Data row laid out by its owning schema (Entity on the server).
    Record,
    /// One field definition inside a schema (ProfileEntity on the server).
    SchemaField,
}

impl TryFrom<u8> for EntityType {
    type Error = DataModelError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(EntityType::Container),
            2 => Ok(EntityType::Schema),
            3 => Ok(EntityType::Record),
            4 => Ok(EntityType::SchemaField),
            other => Err(DataModelError::UnknownEntityType(other)),
        }
    }
}

impl From<EntityType> for u8 {
    fn from(t: EntityType) -> u8 {
        match t {
            EntityType::Container => 1,
            EntityType::Schema => 2,
            EntityType::Record => 3,
            EntityType::SchemaField => 4,
        }
    }
}

impl EntityType {
    pub fn label(&self) -> &'static str {
        match self {
            EntityType::Container => "Container",
            EntityType::Schema => "Schema",
            EntityType::Record => "Record",
            EntityType::SchemaField => "Schema Field",
        }
    }

    /// Label of a hardcoded element slot. Records have none: their layout
    /// comes from the owning schema.
    pub fn fixed_field_name(&self, element_id: u32) -> Option<&'static str> {
        match (self, element_id) {
            (EntityType::Container | EntityType::Schema, 1) => Some("Entity Name"),
            (EntityType::Container | EntityType::Schema, 2) => Some("Status"),
            (EntityType::SchemaField, 1) => Some("Name"),
            (EntityType::SchemaField, 2) => Some("Data Type"),
            (EntityType::SchemaField, 3) => Some("Primary Key"),
            (EntityType::SchemaField, 4) => Some("Foreign Key"),
            (EntityType::SchemaField, 5) => Some("Default Value"),
            (EntityType::SchemaField, 6) => Some("Constraint"),
            (EntityType::SchemaField, 7) => Some("Function"),
            (EntityType::SchemaField, 8) => Some("Function Only"),
            (EntityType::SchemaField, 9) => Some("Order Number"),
            (EntityType::SchemaField, 10) => Some("Allow Null"),
            (EntityType::SchemaField, 11) => Some("Status"),
            _ => None,
        }
    }

    /// Fixed label, or `Element {id}` for unknown slots and records.
    pub fn field_label(&self, element_id: u32) -> String {
        self.fixed_field_name(element_id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Element {element_id}"))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum Status {
    #[default]
    Active,
    Deleted,
}

impl TryFrom<u8> for Status {
    type Error = DataModelError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(Status::Active),
            2 => Ok(Status::Deleted),
            other => Err(DataModelError::UnknownStatus(other)),
        }
    }
}

impl From<Status> for u8 {
    fn from(s: Status) -> u8 {
        match s {
            Status::Active => 1,
            Status::Deleted => 2,
        }
    }
}

/// Tree node as listed by `GET /entities/tree-nodes`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreeNodeDto {
    pub id: NodeId,
    pub name: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub profile_id: Option<NodeId>,
    pub has_children: bool,
    #[serde(default)]
    pub child_count: u32,
    #[serde(default)]
    pub status: Status,
}

/// A node held by the tree store.
///
/// `children` stays empty until loaded; an empty sequence does not mean
/// the node has no children on the server (see `has_children`).
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub id: NodeId,
    pub name: String,
    pub entity_type: EntityType,
    pub parent_id: Option<NodeId>,
    pub profile_id: Option<NodeId>,
    pub has_children: bool,
    pub child_count: u32,
    pub status: Status,
    pub level: usize,
    pub expanded: bool,
    pub loading: bool,
    pub children: Vec<Arc<TreeNode>>,
}

impl TreeNode {
    pub fn from_dto(dto: TreeNodeDto, level: usize) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            entity_type: dto.entity_type,
            parent_id: dto.parent_id,
            profile_id: dto.profile_id,
            has_children: dto.has_children,
            child_count: dto.child_count,
            status: dto.status,
            level,
            expanded: false,
            loading: false,
            children: Vec::new(),
        }
    }

    /// Copy of this node with a different child sequence.
    pub fn with_children(&self, children: Vec<Arc<TreeNode>>) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            entity_type: self.entity_type,
            parent_id: self.parent_id,
            profile_id: self.profile_id,
            has_children: self.has_children,
            child_count: self.child_count,
            status: self.status,
            level: self.level,
            expanded: self.expanded,
            loading: self.loading,
            children,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.status == Status::Deleted
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementValue {
    pub element_id: u32,
    pub value: Value,
    /// Declared tag, verbatim.
    pub data_type: String,
    pub revision_id: i64,
    pub user_id: Option<String>,
}

impl TryFrom<RawElementValue> for ElementValue {
    type Error = DataModelError;

    fn try_from(raw: RawElementValue) -> Result<Self, Self::Error> {
        let value = Value::decode(raw.element_id, &raw.data_type, raw.value)?;
        Ok(Self {
            element_id: raw.element_id,
            value,
            data_type: raw.data_type,
            revision_id: raw.revision_id,
            user_id: raw.user_id,
        })
    }
}

impl<'de> Deserialize<'de> for ElementValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawElementValue::deserialize(deserializer)?;
        ElementValue::try_from(raw).map_err(serde::de::Error::custom)
    }
}

/// Full record as returned by `GET /entities/{id}`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityDetail {
    pub id: NodeId,
    pub entity_type: EntityType,
    #[serde(default)]
    pub profile_id: Option<NodeId>,
    /// Keyed by element id; iteration order is ascending.
    #[serde(default, deserialize_with = "element_map")]
    pub values: BTreeMap<u32, ElementValue>,
    /// Only populated for schema records (their schema-field children).
    #[serde(default)]
    pub children: Option<Vec<EntityDetail>>,
}

/// Keys must be positive and agree with the `elementId` they carry.
fn element_map<'de, D>(deserializer: D) -> Result<BTreeMap<u32, ElementValue>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let map = BTreeMap::<u32, ElementValue>::deserialize(deserializer)?;
    for (key, element) in &map {
        if *key == 0 || *key != element.element_id {
            return Err(serde::de::Error::custom(DataModelError::ElementKey {
                key: *key,
                element_id: element.element_id,
            }));
        }
    }
    Ok(map)
}

impl EntityDetail {
    /// Owning schema id, treating the server's `0` as "none".
    pub fn owning_schema(&self) -> Option<NodeId> {
        self.profile_id.filter(|id| *id > 0)
    }

    pub fn value(&self, element_id: u32) -> Option<&Value> {
        self.values.get(&element_id).map(|v| &v.value)
    }
}

/// One field definition as exposed by `GET /profiles/{id}`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileElement {
    pub id: NodeId,
    #[serde(default)]
    pub properties: ProfileProperties,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileProperties {
    pub name: Option<String>,
    pub data_type: Option<String>,
    pub primary_key: Option<bool>,
    pub order_number: Option<i64>,
    pub allow_null: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub id: NodeId,
    #[serde(default)]
    pub parent_entity_id: Option<NodeId>,
    #[serde(default)]
    pub elements: Vec<ProfileElement>,
    #[serde(default)]
    pub entity_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tree_node_dto_reads_camel_case() {
        let dto: TreeNodeDto = serde_json::from_value(json!({
            "id": 7, "name": "Customers", "entityType": 2, "parentId": 1,
            "hasChildren": true, "childCount": 3, "status": 1
        }))
        .unwrap();
        assert_eq!(dto.entity_type, EntityType::Schema);
        assert_eq!(dto.parent_id, Some(1));
        assert_eq!(dto.profile_id, None);
        assert_eq!(dto.child_count, 3);

        let node = TreeNode::from_dto(dto, 2);
        assert_eq!(node.level, 2);
        assert!(!node.expanded && !node.loading && node.children.is_empty());
    }

    #[test]
    fn unknown_entity_type_is_rejected() {
        let res: Result<TreeNodeDto, _> = serde_json::from_value(json!({
            "id": 1, "name": "x", "entityType": 9, "hasChildren": false
        }));
        assert!(res.is_err());
    }

    #[test]
    fn entity_detail_values_are_typed_and_ordered() {
        let detail: EntityDetail = serde_json::from_value(json!({
            "id": 100, "entityType": 3, "profileId": 20,
            "values": {
                "10": {"elementId": 10, "value": "x", "dataType": "String", "revisionId": 1, "userId": "u"},
                "2": {"elementId": 2, "value": "42", "dataType": "Int", "revisionId": 3, "userId": "u"}
            }
        }))
        .unwrap();
        let keys: Vec<u32> = detail.values.keys().copied().collect();
        assert_eq!(keys, vec![2, 10]);
        assert_eq!(detail.value(2), Some(&Value::Integer(42)));
        assert_eq!(detail.owning_schema(), Some(20));
    }

    #[test]
    fn bad_value_fails_the_record() {
        let res: Result<EntityDetail, _> = serde_json::from_value(json!({
            "id": 1, "entityType": 3,
            "values": {"1": {"elementId": 1, "value": "abc", "dataType": "Int"}}
        }));
        assert!(res.is_err());
    }

    #[test]
    fn zero_element_key_is_rejected() {
        let res: Result<EntityDetail, _> = serde_json::from_value(json!({
            "id": 1, "entityType": 3,
            "values": {"0": {"elementId": 0, "value": "x", "dataType": "String"}}
        }));
        assert!(res.is_err());
    }

    #[test]
    fn element_key_must_match_element_id() {
        let res: Result<EntityDetail, _> = serde_json::from_value(json!({
            "id": 1, "entityType": 3,
            "values": {"3": {"elementId": 7, "value": "x", "dataType": "String"}}
        }));
        let err = res.unwrap_err().to_string();
        assert!(err.contains("key 3"), "{err}");
        assert!(err.contains("element 7"), "{err}");
    }

    #[test]
    fn zero_profile_id_means_no_schema() {
        let detail: EntityDetail =
            serde_json::from_value(json!({"id": 1, "entityType": 3, "profileId": 0})).unwrap();
        assert_eq!(detail.owning_schema(), None);
    }

    #[test]
    fn fixed_labels_cover_known_slots_only() {
        assert_eq!(EntityType::SchemaField.field_label(1), "Name");
        assert_eq!(EntityType::SchemaField.field_label(10), "Allow Null");
        assert_eq!(EntityType::Container.field_label(2), "Status");
        assert_eq!(EntityType::Schema.field_label(3), "Element 3");
        assert_eq!(EntityType::Record.field_label(1), "Element 1");
    }

    #[test]
    fn profile_dto_reads_pascal_case_properties() {
        let profile: ProfileDto = serde_json::from_value(json!({
            "id": 20, "parentEntityId": null, "entityCount": 4,
            "elements": [{"id": 21, "properties": {"Name": "Age", "DataType": "Int", "AllowNull": true, "Unit": "y"}}]
        }))
        .unwrap();
        let props = &profile.elements[0].properties;
        assert_eq!(props.name.as_deref(), Some("Age"));
        assert_eq!(props.allow_null, Some(true));
        assert_eq!(props.extra.get("Unit"), Some(&json!("y")));
    }
}

//! Course tree shapes: the draft a client submits and the baseline loaded
//! from the live (active-only) course rows.
//!
//! Draft ids travel as decimal strings because JavaScript clients cannot
//! hold a 63-bit integer without losing precision. Both strings and plain
//! integers are accepted on input; output is always a string.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// A proposed course tree. Also the shape of the structural document stored
/// in the content store alongside item bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftTree {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub containers: Vec<DraftContainer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftContainer {
    #[serde(default, with = "string_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<DbId>,
    pub position: i32,
    pub name: String,
    #[serde(default)]
    pub items: Vec<DraftItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftItem {
    #[serde(default, with = "string_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<DbId>,
    pub position: i32,
    #[serde(rename = "type")]
    pub item_type: i16,
    #[serde(default)]
    pub name: String,
    /// Set by the client when the body of an existing item was edited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<bool>,
    /// New body. Never persisted in the structural document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl DraftItem {
    pub fn is_updated(&self) -> bool {
        self.updated == Some(true)
    }
}

/// The live tree of a course: active containers and items ordered by
/// position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaselineTree {
    pub containers: Vec<BaselineContainer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaselineContainer {
    pub id: DbId,
    pub position: i32,
    pub name: String,
    pub items: Vec<BaselineItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaselineItem {
    pub id: DbId,
    pub position: i32,
    pub item_type: i16,
    pub name: String,
}

impl BaselineTree {
    /// Render the live tree in draft form so a client can edit and resubmit
    /// it unchanged.
    pub fn to_draft(&self, description: impl Into<String>) -> DraftTree {
        DraftTree {
            description: description.into(),
            containers: self
                .containers
                .iter()
                .map(|c| DraftContainer {
                    id: Some(c.id),
                    position: c.position,
                    name: c.name.clone(),
                    items: c
                        .items
                        .iter()
                        .map(|i| DraftItem {
                            id: Some(i.id),
                            position: i.position,
                            item_type: i.item_type,
                            name: i.name.clone(),
                            updated: None,
                            content: None,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Serde adapter for optional ids encoded as decimal strings.
mod string_id {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::types::DbId;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    pub fn serialize<S: Serializer>(id: &Option<DbId>, serializer: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => serializer.serialize_str(&id.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DbId>, D::Error> {
        let id = match Option::<RawId>::deserialize(deserializer)? {
            None => return Ok(None),
            Some(RawId::Number(n)) => n,
            Some(RawId::Text(s)) => s
                .trim()
                .parse::<DbId>()
                .map_err(|_| D::Error::custom(format!("invalid id '{s}'")))?,
        };
        if id <= 0 {
            return Err(D::Error::custom(format!("invalid id '{id}'")));
        }
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_strings_and_numbers() {
        let draft: DraftTree = serde_json::from_value(serde_json::json!({
            "description": "d",
            "containers": [
                { "id": "7205759403792793600", "position": 1, "name": "A",
                  "items": [ { "id": 11, "position": 1, "type": 0, "name": "x" } ] },
                { "position": 2, "name": "B" }
            ]
        }))
        .unwrap();

        assert_eq!(draft.containers[0].id, Some(7_205_759_403_792_793_600));
        assert_eq!(draft.containers[0].items[0].id, Some(11));
        assert_eq!(draft.containers[1].id, None);
        assert!(draft.containers[1].items.is_empty());
    }

    #[test]
    fn non_numeric_id_is_rejected() {
        let result: Result<DraftContainer, _> = serde_json::from_value(serde_json::json!({
            "id": "abc", "position": 1, "name": "A"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn ids_serialize_as_strings_and_transient_fields_are_omitted() {
        let item = DraftItem {
            id: Some(42),
            position: 1,
            item_type: 1,
            name: "clip".into(),
            updated: None,
            content: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "id": "42", "position": 1, "type": 1, "name": "clip" })
        );
    }

    #[test]
    fn baseline_renders_as_resubmittable_draft() {
        let baseline = BaselineTree {
            containers: vec![BaselineContainer {
                id: 1,
                position: 1,
                name: "Intro".into(),
                items: vec![BaselineItem {
                    id: 10,
                    position: 1,
                    item_type: 0,
                    name: "Hello".into(),
                }],
            }],
        };

        let draft = baseline.to_draft("");
        assert_eq!(draft.containers[0].id, Some(1));
        assert_eq!(draft.containers[0].items[0].id, Some(10));
        assert_eq!(draft.containers[0].items[0].content, None);
    }
}

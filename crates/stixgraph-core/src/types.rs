//! Core domain types for the threat knowledge graph.
//!
//! A STIX bundle is a flat list of loosely-shaped JSON objects. Each element is
//! classified once, at parse time, into a [`ThreatObject`]: either an entity that
//! becomes a graph node, or a relationship that may become an edge. Everything
//! else is ignored.

use serde::{Deserialize, Serialize};

// ── Object Types ──────────────────────────────────────────────────

/// STIX object types that are materialized as graph nodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectType {
    AttackPattern,
    CourseOfAction,
    IntrusionSet,
    Malware,
    Tool,
}

impl ObjectType {
    /// All node-eligible types, in a stable order.
    pub const ALL: [ObjectType; 5] = [
        ObjectType::AttackPattern,
        ObjectType::CourseOfAction,
        ObjectType::IntrusionSet,
        ObjectType::Malware,
        ObjectType::Tool,
    ];

    /// Parse the STIX `type` string. Returns `None` for types that never
    /// become nodes (`relationship`, `x-mitre-tactic`, `identity`, ...).
    pub fn from_stix(s: &str) -> Option<Self> {
        match s {
            "attack-pattern" => Some(Self::AttackPattern),
            "course-of-action" => Some(Self::CourseOfAction),
            "intrusion-set" => Some(Self::IntrusionSet),
            "malware" => Some(Self::Malware),
            "tool" => Some(Self::Tool),
            _ => None,
        }
    }

    /// The STIX `type` string, as persisted in the sink.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AttackPattern => "attack-pattern",
            Self::CourseOfAction => "course-of-action",
            Self::IntrusionSet => "intrusion-set",
            Self::Malware => "malware",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Threat Objects ────────────────────────────────────────────────

/// A node-eligible STIX object (technique, mitigation, group, software).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub object_type: ObjectType,
    /// STIX id, e.g. `attack-pattern--0042a9f5-...`. Unique key across the bundle.
    pub id: String,
    pub name: String,
    /// `revoked` or `x_mitre_deprecated` was set on the source object.
    #[serde(default)]
    pub retired: bool,
}

/// A STIX relationship between two objects, referenced by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relationship {
    /// The relationship's own STIX id, when present.
    pub id: Option<String>,
    /// `uses`, `mitigates`, `subtechnique-of`, `revoked-by`, ...
    pub relationship_type: String,
    pub source_ref: String,
    pub target_ref: String,
    #[serde(default)]
    pub retired: bool,
}

/// A classified STIX object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThreatObject {
    Entity(Entity),
    Relationship(Relationship),
}

impl ThreatObject {
    /// Classify a raw JSON element.
    ///
    /// Anything carrying string `relationship_type`, `source_ref` and `target_ref`
    /// is a relationship, whatever its `type`. Otherwise the element is an entity
    /// when its `type` is node-eligible and it has a string `id`. All other
    /// shapes yield `None` and are ignored by the caller.
    pub fn classify(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let retired = flag(obj, "revoked") || flag(obj, "x_mitre_deprecated");

        if let Some(relationship_type) = obj.get("relationship_type").and_then(|v| v.as_str()) {
            let source_ref = obj.get("source_ref").and_then(|v| v.as_str())?;
            let target_ref = obj.get("target_ref").and_then(|v| v.as_str())?;
            return Some(Self::Relationship(Relationship {
                id: obj.get("id").and_then(|v| v.as_str()).map(str::to_string),
                relationship_type: relationship_type.to_string(),
                source_ref: source_ref.to_string(),
                target_ref: target_ref.to_string(),
                retired,
            }));
        }

        let object_type = obj
            .get("type")
            .and_then(|v| v.as_str())
            .and_then(ObjectType::from_stix)?;
        let id = obj.get("id").and_then(|v| v.as_str())?;
        let name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        Some(Self::Entity(Entity {
            object_type,
            id: id.to_string(),
            name: name.to_string(),
            retired,
        }))
    }

    pub fn is_retired(&self) -> bool {
        match self {
            Self::Entity(e) => e.retired,
            Self::Relationship(r) => r.retired,
        }
    }
}

fn flag(obj: &serde_json::Map<String, serde_json::Value>, key: &str) -> bool {
    obj.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_attack_pattern() {
        let value = json!({
            "type": "attack-pattern",
            "id": "attack-pattern--01",
            "name": "Phishing",
        });

        let obj = ThreatObject::classify(&value).unwrap();
        assert_eq!(
            obj,
            ThreatObject::Entity(Entity {
                object_type: ObjectType::AttackPattern,
                id: "attack-pattern--01".to_string(),
                name: "Phishing".to_string(),
                retired: false,
            })
        );
    }

    #[test]
    fn classify_relationship() {
        let value = json!({
            "type": "relationship",
            "id": "relationship--01",
            "relationship_type": "uses",
            "source_ref": "intrusion-set--01",
            "target_ref": "attack-pattern--01",
        });

        match ThreatObject::classify(&value) {
            Some(ThreatObject::Relationship(rel)) => {
                assert_eq!(rel.relationship_type, "uses");
                assert_eq!(rel.source_ref, "intrusion-set--01");
                assert_eq!(rel.target_ref, "attack-pattern--01");
                assert_eq!(rel.id.as_deref(), Some("relationship--01"));
            }
            other => panic!("expected relationship, got {other:?}"),
        }
    }

    #[test]
    fn relationship_detected_by_keys_not_type() {
        let value = json!({
            "type": "x-custom",
            "relationship_type": "mitigates",
            "source_ref": "a",
            "target_ref": "b",
        });
        assert!(matches!(
            ThreatObject::classify(&value),
            Some(ThreatObject::Relationship(_))
        ));
    }

    #[test]
    fn ignores_other_types_and_shapes() {
        assert!(ThreatObject::classify(&json!({"type": "identity", "id": "identity--1"})).is_none());
        assert!(ThreatObject::classify(&json!({"type": "x-mitre-tactic", "id": "t--1"})).is_none());
        assert!(ThreatObject::classify(&json!({"type": "malware"})).is_none());
        assert!(ThreatObject::classify(&json!("not an object")).is_none());
        assert!(ThreatObject::classify(&json!({"relationship_type": "uses", "source_ref": "a"})).is_none());
    }

    #[test]
    fn missing_name_defaults_to_empty() {
        let obj = ThreatObject::classify(&json!({"type": "tool", "id": "tool--1"})).unwrap();
        match obj {
            ThreatObject::Entity(e) => assert_eq!(e.name, ""),
            _ => panic!("expected entity"),
        }
    }

    #[test]
    fn retired_flags() {
        let revoked = json!({"type": "malware", "id": "malware--1", "revoked": true});
        let deprecated = json!({"type": "tool", "id": "tool--1", "x_mitre_deprecated": true});
        let live = json!({"type": "tool", "id": "tool--2", "revoked": false});

        assert!(ThreatObject::classify(&revoked).unwrap().is_retired());
        assert!(ThreatObject::classify(&deprecated).unwrap().is_retired());
        assert!(!ThreatObject::classify(&live).unwrap().is_retired());
    }

    #[test]
    fn object_type_serializes_kebab() {
        let json = serde_json::to_string(&ObjectType::CourseOfAction).unwrap();
        assert_eq!(json, "\"course-of-action\"");
        for t in ObjectType::ALL {
            assert_eq!(ObjectType::from_stix(t.as_str()), Some(t));
        }
        assert_eq!(ObjectType::from_stix("relationship"), None);
    }
}

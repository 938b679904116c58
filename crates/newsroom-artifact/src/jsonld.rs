//! JSON-LD graph artifact
//!
//! The metadata half of an Immutable Canonical File: a flat `@graph` of
//! nodes addressed by fragment `@id`s. Hashing is canonical and skips the
//! node properties listed in [`VOLATILE_KEYS`], so identifiers spliced in
//! after hashing and run timestamps do not change the hash. Only the named
//! node's own top-level property is skipped; nested values are always hashed.

use crate::artifact::{private, ArtifactError, ArtifactType};
use crate::canonical;
use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// `@id` of the snapshot node
pub const SNAPSHOT_NODE_ID: &str = "#snapshot";

/// `@id` of the karma query node
pub const KARMA_QUERY_NODE_ID: &str = "#karmaQuery";

/// `(node @id, property)` pairs never included in the content hash
pub const VOLATILE_KEYS: [(&str, &str); 4] = [
    (SNAPSHOT_NODE_ID, "generatedAt"),
    (SNAPSHOT_NODE_ID, "snapshotId"),
    (SNAPSHOT_NODE_ID, "contentHash"),
    (KARMA_QUERY_NODE_ID, "queryTimestamp"),
];

fn strip_volatile(node: &mut Value) {
    let Some(map) = node.as_object_mut() else {
        return;
    };
    let Some(id) = map.get("@id").and_then(Value::as_str).map(str::to_owned) else {
        return;
    };
    for (node_id, key) in VOLATILE_KEYS {
        if node_id == id {
            map.remove(key);
        }
    }
}

/// A single graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonLdNode {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub node_type: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl JsonLdNode {
    /// Create node with no properties
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            properties: Map::new(),
        }
    }

    /// Builder-style property insertion
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Insert or replace a property
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Read a property
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// A JSON-LD document: context plus flat graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonLdGraph {
    #[serde(rename = "@context")]
    pub context: Value,
    #[serde(rename = "@graph")]
    pub graph: Vec<JsonLdNode>,
}

impl JsonLdGraph {
    /// Create an empty graph with the given context
    #[inline]
    #[must_use]
    pub fn new(context: Value) -> Self {
        Self {
            context,
            graph: Vec::new(),
        }
    }

    /// Append a node
    pub fn push(&mut self, node: JsonLdNode) {
        self.graph.push(node);
    }

    /// Find node by `@id`
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&JsonLdNode> {
        self.graph.iter().find(|n| n.id == id)
    }

    /// Find node by `@id` for mutation
    pub fn node_mut(&mut self, id: &str) -> Option<&mut JsonLdNode> {
        self.graph.iter_mut().find(|n| n.id == id)
    }

    /// Nodes whose `@id` starts with the prefix, in graph order
    pub fn nodes_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a JsonLdNode> + 'a {
        self.graph.iter().filter(move |n| n.id.starts_with(prefix))
    }

    /// Canonical serialization used for hashing
    ///
    /// # Errors
    /// Returns error if the graph cannot be serialized
    pub fn canonical_string(&self) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Some(nodes) = value.get_mut("@graph").and_then(Value::as_array_mut) {
            nodes.iter_mut().for_each(strip_volatile);
        }
        canonical::to_canonical_string(&value)
    }

    /// Pretty JSON for human-facing output
    ///
    /// # Errors
    /// Returns error if the graph cannot be serialized
    pub fn to_pretty_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Artifact type for snapshot JSON-LD graphs
#[derive(Debug, Clone)]
pub struct JsonLdArtifact;

impl private::Sealed for JsonLdArtifact {}

impl ArtifactType for JsonLdArtifact {
    type Content = JsonLdGraph;

    fn hash(content: &Self::Content) -> ContentHash {
        // Serializing a Map/Vec/String tree cannot fail.
        let canonical = content.canonical_string().unwrap_or_default();
        ContentHash::compute(canonical.as_bytes())
    }

    const TYPE_ID: &'static str = "jsonld_graph";

    fn validate_content(content: &Self::Content) -> Result<(), ArtifactError> {
        let mut seen = HashSet::new();
        for node in &content.graph {
            if node.id.is_empty() {
                return Err(ArtifactError::InvariantViolation("graph node without @id".to_string()));
            }
            if !seen.insert(node.id.as_str()) {
                return Err(ArtifactError::InvariantViolation(format!(
                    "duplicate @id: {}",
                    node.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use serde_json::json;

    fn sample() -> JsonLdGraph {
        let mut graph = JsonLdGraph::new(json!({"@vocab": "https://schema.org/"}));
        graph.push(
            JsonLdNode::new("#snapshot", "Dataset")
                .with("projectId", "p1")
                .with("generatedAt", "2025-02-01T00:00:00Z"),
        );
        graph.push(JsonLdNode::new("#milestone-0", "Event").with("summary", "Shipped"));
        graph
    }

    #[test]
    fn serializes_with_jsonld_keywords() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["@graph"][0]["@id"], "#snapshot");
        assert_eq!(value["@graph"][0]["projectId"], "p1");
        assert!(value.get("@context").is_some());
    }

    #[test]
    fn hash_ignores_volatile_keys() {
        let a = Artifact::<JsonLdArtifact>::new(sample()).unwrap();
        let mut later = sample();
        later
            .node_mut("#snapshot")
            .unwrap()
            .set("generatedAt", "2030-01-01T00:00:00Z");
        let b = Artifact::<JsonLdArtifact>::new(later).unwrap();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn hash_tracks_content() {
        let a = Artifact::<JsonLdArtifact>::new(sample()).unwrap();
        let mut changed = sample();
        changed.node_mut("#milestone-0").unwrap().set("summary", "Shipped v2");
        let b = Artifact::<JsonLdArtifact>::new(changed).unwrap();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn splicing_identifiers_keeps_artifact_valid() {
        let mut artifact = Artifact::<JsonLdArtifact>::new(sample()).unwrap();
        let hash = artifact.hash().to_string();
        artifact
            .update(|g| {
                let node = g.node_mut("#snapshot").unwrap();
                node.set("snapshotId", "icf-1-abc");
                node.set("contentHash", hash.clone());
            })
            .unwrap();
        assert!(artifact.verify());
    }

    #[test]
    fn volatile_names_elsewhere_are_hashed() {
        let nested = |id: &str| {
            let mut graph = sample();
            graph
                .node_mut("#snapshot")
                .unwrap()
                .set("source", json!({ "generatedAt": id, "rows": [{ "snapshotId": id }] }));
            Artifact::<JsonLdArtifact>::new(graph).unwrap()
        };
        assert_ne!(nested("X-1").hash(), nested("Y-2").hash());

        let other_node = |id: &str| {
            let mut graph = sample();
            graph.node_mut("#milestone-0").unwrap().set("snapshotId", id);
            Artifact::<JsonLdArtifact>::new(graph).unwrap()
        };
        assert_ne!(other_node("X-1").hash(), other_node("Y-2").hash());
    }

    #[test]
    fn query_timestamp_is_volatile() {
        let with_timestamp = |ts: &str| {
            let mut graph = sample();
            graph.push(
                JsonLdNode::new(KARMA_QUERY_NODE_ID, "KarmaQuery")
                    .with("queryTimestamp", ts)
                    .with("results", json!({ "p": [{ "queryTimestamp": "kept" }] })),
            );
            Artifact::<JsonLdArtifact>::new(graph).unwrap()
        };
        assert_eq!(
            with_timestamp("2025-02-01T00:00:00Z").hash(),
            with_timestamp("2025-02-02T00:00:00Z").hash()
        );
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut graph = sample();
        graph.push(JsonLdNode::new("#snapshot", "Dataset"));
        assert!(Artifact::<JsonLdArtifact>::new(graph).is_err());
    }
}

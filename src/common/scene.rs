//! Scene loading, parsing, and validation logic.
//!
//! A scene fixes the simulated area and the node placement. It is either read
//! from a JSON file or generated uniformly at random from a seed.

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;

use crate::simulation::types::{MAX_NODE_COUNT, NodeId, Position};

/// Error type for scene loading failures.
#[derive(Debug)]
pub enum SceneLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for SceneLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            SceneLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            SceneLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for SceneLoadError {}

/// A node as placed by the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub node_id: NodeId,
    pub position: Position,
    /// Overrides the configured radio range for this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radio_range: Option<f64>,
}

/// Root structure representing the entire scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Extent of the area; node coordinates lie in `[0, area]` on every axis.
    pub area: Position,
    pub nodes: Vec<SceneNode>,
}

impl Scene {
    /// Place `node_count` nodes uniformly inside `area` (z fixed at 0).
    ///
    /// The same seed always yields the same scene.
    pub fn random(node_count: usize, area: Position, radio_range: Option<f64>, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let nodes = (0..node_count)
            .map(|idx| SceneNode {
                node_id: idx as NodeId,
                position: Position::new(rng.r#gen::<f64>() * area.x, rng.r#gen::<f64>() * area.y, 0.0),
                radio_range,
            })
            .collect();
        Self { area, nodes }
    }

    /// Radio range of `node`, falling back to `default` when the scene sets none.
    pub fn radio_range_of(&self, node: &SceneNode, default: f64) -> f64 {
        node.radio_range.unwrap_or(default)
    }

    /// Nodes sorted by id. Validated scenes are dense, so index equals id.
    pub fn nodes_by_id(&self) -> Vec<&SceneNode> {
        let mut nodes: Vec<&SceneNode> = self.nodes.iter().collect();
        nodes.sort_by_key(|n| n.node_id);
        nodes
    }
}

/// Parse and validate a scene from JSON text.
pub fn parse_scene(data: &str) -> Result<Scene, SceneLoadError> {
    let scene: Scene = serde_json::from_str(data)
        .context("Invalid JSON format")
        .map_err(|e| SceneLoadError::ParseError(format!("{:#}", e)))?;

    validate_scene(&scene).map_err(SceneLoadError::ValidationError)?;

    Ok(scene)
}

/// Load and parse a scene from a file.
pub fn load_scene(path: &str) -> Result<Scene, SceneLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| SceneLoadError::FileReadError(format!("{:#}", e)))?;

    parse_scene(&data)
}

/// Validate scene configuration.
///
/// Returns `Err(String)` with a description of the first problem found.
pub fn validate_scene(scene: &Scene) -> Result<(), String> {
    let area = &scene.area;
    if !(area.x > 0.0 && area.y > 0.0 && area.z >= 0.0) || !(area.x.is_finite() && area.y.is_finite() && area.z.is_finite()) {
        return Err(format!("Invalid area ({}, {}, {}): x and y must be positive", area.x, area.y, area.z));
    }

    if scene.nodes.is_empty() {
        return Err("Scene must contain at least one node".to_string());
    }
    if scene.nodes.len() > MAX_NODE_COUNT {
        return Err(format!("Node count {} exceeds maximum of {}", scene.nodes.len(), MAX_NODE_COUNT));
    }

    let mut node_ids = HashSet::new();
    for node in &scene.nodes {
        if !node_ids.insert(node.node_id) {
            return Err(format!("Duplicate node_id found: {}", node.node_id));
        }
    }
    // Ids index the node arena directly.
    let count = scene.nodes.len() as NodeId;
    if let Some(node) = scene.nodes.iter().find(|n| n.node_id < 0 || n.node_id >= count) {
        return Err(format!("Node id {} outside 0..{}: ids must be dense", node.node_id, count));
    }

    for node in &scene.nodes {
        let p = &node.position;
        let inside = (0.0..=area.x).contains(&p.x) && (0.0..=area.y).contains(&p.y) && (0.0..=area.z).contains(&p.z);
        if !inside {
            return Err(format!(
                "Node {} position ({}, {}, {}) outside area ({}, {}, {})",
                node.node_id, p.x, p.y, p.z, area.x, area.y, area.z
            ));
        }

        if let Some(range) = node.radio_range {
            if !(range.is_finite() && range > 0.0) {
                return Err(format!("Node {} radio_range {} must be positive", node.node_id, range));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TWO_NODES: &str = r#"{
        "area": { "x": 10.0, "y": 10.0 },
        "nodes": [
            { "node_id": 1, "position": { "x": 2.0, "y": 3.0 } },
            { "node_id": 0, "position": { "x": 1.0, "y": 1.0, "z": 0.0 }, "radio_range": 2.5 }
        ]
    }"#;

    #[test]
    fn parses_scene_with_defaults() {
        let scene = parse_scene(TWO_NODES).unwrap();
        assert_eq!(scene.nodes.len(), 2);
        assert_eq!(scene.nodes[0].position, Position::new(2.0, 3.0, 0.0));
        assert_eq!(scene.radio_range_of(&scene.nodes[0], 1.5), 1.5);
        assert_eq!(scene.radio_range_of(&scene.nodes[1], 1.5), 2.5);

        let ids: Vec<NodeId> = scene.nodes_by_id().iter().map(|n| n.node_id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn rejects_invalid_scenes() {
        let cases = [
            (r#"{"area": {"x": 5, "y": 5}, "nodes": []}"#, "at least one node"),
            (
                r#"{"area": {"x": 5, "y": 5}, "nodes": [{"node_id": 0, "position": {"x": 1, "y": 1}}, {"node_id": 0, "position": {"x": 2, "y": 1}}]}"#,
                "Duplicate",
            ),
            (r#"{"area": {"x": 5, "y": 5}, "nodes": [{"node_id": 3, "position": {"x": 1, "y": 1}}]}"#, "dense"),
            (r#"{"area": {"x": 5, "y": 5}, "nodes": [{"node_id": 0, "position": {"x": 6, "y": 1}}]}"#, "outside area"),
            (
                r#"{"area": {"x": 5, "y": 5}, "nodes": [{"node_id": 0, "position": {"x": 1, "y": 1}, "radio_range": 0}]}"#,
                "must be positive",
            ),
            (r#"{"area": {"x": 0, "y": 5}, "nodes": [{"node_id": 0, "position": {"x": 0, "y": 1}}]}"#, "Invalid area"),
        ];

        for (json, expected) in cases {
            match parse_scene(json) {
                Err(SceneLoadError::ValidationError(msg)) => assert!(msg.contains(expected), "{msg}"),
                other => panic!("expected validation error containing {expected:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(parse_scene("{ nodes: "), Err(SceneLoadError::ParseError(_))));
    }

    #[test]
    fn loads_scene_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TWO_NODES.as_bytes()).unwrap();
        let scene = load_scene(file.path().to_str().unwrap()).unwrap();
        assert_eq!(scene.nodes.len(), 2);

        assert!(matches!(load_scene("/definitely/not/here.json"), Err(SceneLoadError::FileReadError(_))));
    }

    #[test]
    fn random_scene_is_seeded_and_valid() {
        let area = Position::new(20.0, 10.0, 0.0);
        let a = Scene::random(50, area, None, 7);
        let b = Scene::random(50, area, None, 7);
        let c = Scene::random(50, area, None, 8);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(validate_scene(&a).is_ok());
        assert_eq!(a.nodes[49].node_id, 49);
    }
}

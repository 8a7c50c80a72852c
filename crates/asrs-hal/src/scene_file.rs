//! TOML scene descriptions for [`SimScene`].
//!
//! A scene file is a list of `[[body]]` tables.  Every body is a box mesh
//! (or an empty locator) posed relative to its parent, which must be
//! declared earlier in the file:
//!
//! ```toml
//! [[body]]
//! name = "ASRS_Shuttle"
//! half_extents = [1.0, 0.6, 0.2]
//!
//! [[body]]
//! name = "SENSOR_F"
//! parent = "ASRS_Shuttle"
//! half_extents = [0.05, 0.05, 0.05]
//! location = [1.1, 0.0, 0.0]
//!
//! [[body]]
//! name = "Rail_Origin"
//! kind = "empty"
//! ```

use std::path::Path;

use asrs_perception::transform::{Quaternion, Transform3D, Vec3};
use asrs_types::{BodyKind, TwinError};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::scene::Scene;
use crate::sim::{SimScene, box_triangles};

#[derive(Error, Debug)]
pub enum SceneFileError {
    #[error("failed to read scene file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse scene file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("body '{body}' references parent '{parent}' which is not declared before it")]
    UnknownParent { body: String, parent: String },

    #[error("mesh body '{0}' needs half_extents")]
    MissingExtents(String),

    #[error(transparent)]
    Scene(#[from] TwinError),
}

#[derive(Debug, Deserialize)]
struct SceneFile {
    #[serde(default)]
    body: Vec<BodySpec>,
}

#[derive(Debug, Deserialize)]
struct BodySpec {
    name: String,
    #[serde(default = "default_kind")]
    kind: BodyKind,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    half_extents: Option<[f32; 3]>,
    #[serde(default)]
    location: [f32; 3],
    /// Rotation about the local Z axis, in degrees.
    #[serde(default)]
    yaw_deg: f32,
}

fn default_kind() -> BodyKind {
    BodyKind::Mesh
}

impl SimScene {
    /// Build a scene from TOML text.
    ///
    /// # Errors
    ///
    /// See [`SceneFileError`].
    pub fn from_toml_str(raw: &str) -> Result<Self, SceneFileError> {
        let file: SceneFile = toml::from_str(raw)?;
        let mut scene = SimScene::new();

        for spec in file.body {
            let parent = match &spec.parent {
                Some(p) => Some(scene.find(p).ok_or_else(|| SceneFileError::UnknownParent {
                    body: spec.name.clone(),
                    parent: p.clone(),
                })?),
                None => None,
            };

            let [x, y, z] = spec.location;
            let pose = Transform3D::new(
                Vec3::new(x, y, z),
                Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), spec.yaw_deg.to_radians()),
            );

            let triangles = match spec.kind {
                BodyKind::Mesh => {
                    let [hx, hy, hz] = spec
                        .half_extents
                        .ok_or_else(|| SceneFileError::MissingExtents(spec.name.clone()))?;
                    box_triangles(Vec3::new(hx, hy, hz))
                }
                BodyKind::Empty => Vec::new(),
            };
            scene.add_body(spec.name, spec.kind, triangles, parent, pose)?;
        }

        Ok(scene)
    }

    /// Load a scene file from disk.
    ///
    /// # Errors
    ///
    /// See [`SceneFileError`].
    pub fn load(path: &Path) -> Result<Self, SceneFileError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SceneFileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let scene = Self::from_toml_str(&raw)?;
        info!(path = %path.display(), bodies = scene.len(), "scene loaded");
        Ok(scene)
    }
}

//! In-process scene for headless runs and tests.
//!
//! [`SimScene`] keeps a flat list of bodies with parent links and local
//! poses, and derives world poses by composing the parent chain on demand.
//! It stands in for the external 3-D engine so the full twin can run in CI
//! and from the command line without one.
//!
//! # Example
//!
//! ```rust
//! use asrs_hal::scene::Scene;
//! use asrs_hal::sim::SimScene;
//! use asrs_perception::transform::Vec3;
//!
//! let mut scene = SimScene::new();
//! let shuttle = scene.add_box("ASRS_Shuttle", Vec3::new(1.0, 0.5, 0.2), Vec3::zero());
//! let sensor = scene
//!     .add_child_box("SENSOR_F", shuttle, Vec3::new(0.1, 0.1, 0.1), Vec3::new(1.2, 0.0, 0.0))
//!     .expect("shuttle exists");
//!
//! assert_eq!(scene.parent(sensor), Some(shuttle));
//! assert_eq!(scene.find("SENSOR_F"), Some(sensor));
//! ```

use asrs_perception::bvh::Triangle;
use asrs_perception::transform::{Transform3D, Vec3};
use asrs_types::{BodyId, BodyKind, TwinError};
use tracing::debug;

use crate::scene::Scene;

// ────────────────────────────────────────────────────────────────────────────
// Geometry helpers
// ────────────────────────────────────────────────────────────────────────────

/// The twelve triangles of an axis-aligned box centred on the origin.
pub fn box_triangles(half_extents: Vec3) -> Vec<Triangle> {
    let h = half_extents;
    let v = |sx: f32, sy: f32, sz: f32| Vec3::new(sx * h.x, sy * h.y, sz * h.z);
    let corners = [
        v(-1.0, -1.0, -1.0),
        v(1.0, -1.0, -1.0),
        v(1.0, 1.0, -1.0),
        v(-1.0, 1.0, -1.0),
        v(-1.0, -1.0, 1.0),
        v(1.0, -1.0, 1.0),
        v(1.0, 1.0, 1.0),
        v(-1.0, 1.0, 1.0),
    ];
    const FACES: [[usize; 3]; 12] = [
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [1, 2, 6],
        [1, 6, 5],
        [2, 3, 7],
        [2, 7, 6],
        [3, 0, 4],
        [3, 4, 7],
    ];
    FACES
        .iter()
        .map(|f| Triangle::new(corners[f[0]], corners[f[1]], corners[f[2]]))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// SimScene
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct SimBody {
    name: String,
    kind: BodyKind,
    /// Mesh triangles in the body's own frame.
    triangles: Vec<Triangle>,
    parent: Option<BodyId>,
    local: Transform3D,
}

/// A flat, in-memory body store implementing [`Scene`].
///
/// Iteration order is insertion order.  Names are not required to be
/// unique; lookups return the first match.
#[derive(Debug, Clone, Default)]
pub struct SimScene {
    bodies: Vec<SimBody>,
}

impl SimScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bodies.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Add a root mesh body with the given local-frame triangles.
    pub fn add_mesh(
        &mut self,
        name: impl Into<String>,
        triangles: Vec<Triangle>,
        pose: Transform3D,
    ) -> BodyId {
        self.push(SimBody {
            name: name.into(),
            kind: BodyKind::Mesh,
            triangles,
            parent: None,
            local: pose,
        })
    }

    /// Add a root box mesh centred at `location`.
    pub fn add_box(&mut self, name: impl Into<String>, half_extents: Vec3, location: Vec3) -> BodyId {
        self.add_mesh(
            name,
            box_triangles(half_extents),
            Transform3D::from_translation(location),
        )
    }

    /// Add a box mesh parented to `parent` at `offset` in the parent frame.
    ///
    /// # Errors
    ///
    /// [`TwinError::UnknownBody`] when `parent` does not exist.
    pub fn add_child_box(
        &mut self,
        name: impl Into<String>,
        parent: BodyId,
        half_extents: Vec3,
        offset: Vec3,
    ) -> Result<BodyId, TwinError> {
        self.add_body(
            name,
            BodyKind::Mesh,
            box_triangles(half_extents),
            Some(parent),
            Transform3D::from_translation(offset),
        )
    }

    /// Add a body of any kind under an optional parent.  Triangles of a
    /// non-mesh body are discarded.
    ///
    /// # Errors
    ///
    /// [`TwinError::UnknownBody`] when `parent` does not exist.
    pub fn add_body(
        &mut self,
        name: impl Into<String>,
        kind: BodyKind,
        triangles: Vec<Triangle>,
        parent: Option<BodyId>,
        local: Transform3D,
    ) -> Result<BodyId, TwinError> {
        if let Some(p) = parent {
            self.body(p)?;
        }
        let triangles = match kind {
            BodyKind::Mesh => triangles,
            BodyKind::Empty => Vec::new(),
        };
        Ok(self.push(SimBody {
            name: name.into(),
            kind,
            triangles,
            parent,
            local,
        }))
    }

    /// Add a root non-mesh body (a locator or empty).
    pub fn add_empty(&mut self, name: impl Into<String>, location: Vec3) -> BodyId {
        self.push(SimBody {
            name: name.into(),
            kind: BodyKind::Empty,
            triangles: Vec::new(),
            parent: None,
            local: Transform3D::from_translation(location),
        })
    }

    /// World-space position of `id`.
    pub fn location(&self, id: BodyId) -> Option<Vec3> {
        self.world_transform(id).map(|t| t.translation)
    }

    fn push(&mut self, body: SimBody) -> BodyId {
        let id = BodyId(self.bodies.len());
        debug!(body = %id, name = %body.name, kind = ?body.kind, "sim body added");
        self.bodies.push(body);
        id
    }

    fn body(&self, id: BodyId) -> Result<&SimBody, TwinError> {
        self.bodies.get(id.0).ok_or(TwinError::UnknownBody(id))
    }

    fn body_mut(&mut self, id: BodyId) -> Result<&mut SimBody, TwinError> {
        self.bodies.get_mut(id.0).ok_or(TwinError::UnknownBody(id))
    }

    /// True when `ancestor` is `id` or one of its parents.
    fn is_ancestor(&self, ancestor: BodyId, id: BodyId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.bodies.get(c.0).and_then(|b| b.parent);
        }
        false
    }
}

impl Scene for SimScene {
    fn bodies(&self) -> Vec<BodyId> {
        (0..self.bodies.len()).map(BodyId).collect()
    }

    fn name(&self, id: BodyId) -> Option<&str> {
        self.bodies.get(id.0).map(|b| b.name.as_str())
    }

    fn kind(&self, id: BodyId) -> Option<BodyKind> {
        self.bodies.get(id.0).map(|b| b.kind)
    }

    fn parent(&self, id: BodyId) -> Option<BodyId> {
        self.bodies.get(id.0).and_then(|b| b.parent)
    }

    fn local_transform(&self, id: BodyId) -> Option<Transform3D> {
        self.bodies.get(id.0).map(|b| b.local)
    }

    fn world_transform(&self, id: BodyId) -> Option<Transform3D> {
        let body = self.bodies.get(id.0)?;
        let mut world = body.local;
        let mut parent = body.parent;
        while let Some(p) = parent {
            let pb = self.bodies.get(p.0)?;
            world = pb.local.compose(world);
            parent = pb.parent;
        }
        Some(world)
    }

    fn world_triangles(&self, id: BodyId) -> Option<Vec<Triangle>> {
        let body = self.bodies.get(id.0)?;
        if body.kind != BodyKind::Mesh {
            return None;
        }
        let world = self.world_transform(id)?;
        Some(body.triangles.iter().map(|t| t.transformed(&world)).collect())
    }

    fn set_parent(&mut self, id: BodyId, parent: Option<BodyId>) -> Result<(), TwinError> {
        self.body(id)?;
        if let Some(p) = parent {
            self.body(p)?;
            if self.is_ancestor(id, p) {
                return Err(TwinError::InvalidHierarchy { child: id, parent: p });
            }
        }
        self.body_mut(id)?.parent = parent;
        Ok(())
    }

    fn set_local_transform(&mut self, id: BodyId, local: Transform3D) -> Result<(), TwinError> {
        self.body_mut(id)?.local = local;
        Ok(())
    }

    fn set_world_transform(&mut self, id: BodyId, world: Transform3D) -> Result<(), TwinError> {
        let local = match self.body(id)?.parent {
            Some(p) => {
                let parent_world = self.world_transform(p).ok_or(TwinError::UnknownBody(p))?;
                parent_world.inverse().compose(world)
            }
            None => world,
        };
        self.body_mut(id)?.local = local;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use asrs_perception::transform::Quaternion;

    fn half() -> Vec3 {
        Vec3::new(0.5, 0.5, 0.5)
    }

    #[test]
    fn box_triangles_span_the_extents() {
        let tris = box_triangles(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(tris.len(), 12);
        let mut min = Vec3::new(f32::MAX, f32::MAX, f32::MAX);
        let mut max = Vec3::new(f32::MIN, f32::MIN, f32::MIN);
        for t in &tris {
            let b = t.bounds();
            min = min.min(b.min);
            max = max.max(b.max);
        }
        assert_eq!(min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(max, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn find_and_children_use_scene_order() {
        let mut scene = SimScene::new();
        let shuttle = scene.add_box("ASRS_Shuttle", half(), Vec3::zero());
        let a = scene.add_child_box("SENSOR_A", shuttle, half(), Vec3::zero()).unwrap();
        let _free = scene.add_box("Pallet.001", half(), Vec3::new(5.0, 0.0, 0.0));
        let b = scene.add_child_box("SENSOR_B", shuttle, half(), Vec3::zero()).unwrap();

        assert_eq!(scene.len(), 4);
        assert_eq!(scene.find("SENSOR_B"), Some(b));
        assert_eq!(scene.find("ghost"), None);
        assert_eq!(scene.children(shuttle), vec![a, b]);
    }

    #[test]
    fn child_world_pose_follows_parent() {
        let mut scene = SimScene::new();
        let shuttle = scene.add_box("ASRS_Shuttle", half(), Vec3::new(2.0, 0.0, 0.0));
        let sensor = scene
            .add_child_box("SENSOR_F", shuttle, half(), Vec3::new(1.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(scene.location(sensor), Some(Vec3::new(3.0, 0.0, 0.0)));

        scene
            .set_local_transform(shuttle, Transform3D::from_translation(Vec3::new(4.0, 0.0, 0.0)))
            .unwrap();
        assert_eq!(scene.location(sensor), Some(Vec3::new(5.0, 0.0, 0.0)));
    }

    #[test]
    fn world_triangles_only_for_meshes() {
        let mut scene = SimScene::new();
        let mesh = scene.add_box("Pallet.001", half(), Vec3::new(0.0, 0.0, 1.0));
        let empty = scene.add_empty("Marker", Vec3::zero());

        let tris = scene.world_triangles(mesh).unwrap();
        assert!(tris.iter().all(|t| t.bounds().min.z >= 0.5 - 1e-6));
        assert!(scene.world_triangles(empty).is_none());
        assert!(scene.world_triangles(BodyId(99)).is_none());
        assert_eq!(scene.kind(empty), Some(BodyKind::Empty));
    }

    #[test]
    fn set_world_transform_under_rotated_parent() {
        let mut scene = SimScene::new();
        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 0.6);
        let parent = scene.add_mesh(
            "Carrier_Shuttle",
            box_triangles(half()),
            Transform3D::new(Vec3::new(1.0, 2.0, 0.0), q),
        );
        let child = scene.add_child_box("Pallet.002", parent, half(), Vec3::zero()).unwrap();

        let target = Transform3D::from_translation(Vec3::new(-3.0, 4.0, 1.0));
        scene.set_world_transform(child, target).unwrap();
        assert!(scene.world_transform(child).unwrap().approx_eq(&target, 1e-5));
        assert_eq!(scene.parent(child), Some(parent));
    }

    #[test]
    fn set_parent_rejects_cycles_and_unknown_bodies() {
        let mut scene = SimScene::new();
        let a = scene.add_box("A", half(), Vec3::zero());
        let b = scene.add_child_box("B", a, half(), Vec3::zero()).unwrap();

        assert_eq!(
            scene.set_parent(a, Some(b)),
            Err(TwinError::InvalidHierarchy { child: a, parent: b })
        );
        assert_eq!(
            scene.set_parent(a, Some(a)),
            Err(TwinError::InvalidHierarchy { child: a, parent: a })
        );
        assert_eq!(scene.set_parent(BodyId(42), None), Err(TwinError::UnknownBody(BodyId(42))));
        assert!(scene.add_child_box("C", BodyId(42), half(), Vec3::zero()).is_err());

        scene.set_parent(b, None).unwrap();
        assert_eq!(scene.parent(b), None);
    }
}

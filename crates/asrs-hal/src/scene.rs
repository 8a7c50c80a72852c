//! The `Scene` trait – the twin's only view of the 3-D world.
//!
//! The scene owns every body: its mesh, its pose and its place in the
//! hierarchy.  The rest of the twin only ever talks to this trait, so the
//! same scanner and poll loop run against the in-process
//! [`SimScene`][crate::sim::SimScene] in tests and against an external
//! engine in production.
//!
//! Bodies are never created or destroyed through this trait; the twin only
//! reparents pallets and moves shuttles.

use asrs_perception::bvh::Triangle;
use asrs_perception::transform::Transform3D;
use asrs_types::{BodyId, BodyKind, TwinError};

/// Read access plus the few mutations the twin performs.
pub trait Scene {
    /// Every body, in the scene's own iteration order.
    fn bodies(&self) -> Vec<BodyId>;

    /// Name of `id`, or `None` for an unknown handle.
    fn name(&self, id: BodyId) -> Option<&str>;

    fn kind(&self, id: BodyId) -> Option<BodyKind>;

    /// Parent of `id`; `None` for root bodies and unknown handles.
    fn parent(&self, id: BodyId) -> Option<BodyId>;

    /// Pose of `id` relative to its parent (or the world for root bodies).
    fn local_transform(&self, id: BodyId) -> Option<Transform3D>;

    fn world_transform(&self, id: BodyId) -> Option<Transform3D>;

    /// World-space triangles of a mesh body.
    ///
    /// Returns `None` for non-mesh bodies and unknown handles.
    fn world_triangles(&self, id: BodyId) -> Option<Vec<Triangle>>;

    /// Change the parent link only.  The local transform is kept as is, so
    /// the world pose generally changes; callers that need continuity set
    /// the local transform afterwards.
    ///
    /// # Errors
    ///
    /// [`TwinError::UnknownBody`] for a stale handle and
    /// [`TwinError::InvalidHierarchy`] when the link would form a cycle.
    fn set_parent(&mut self, id: BodyId, parent: Option<BodyId>) -> Result<(), TwinError>;

    /// # Errors
    ///
    /// [`TwinError::UnknownBody`] for a stale handle.
    fn set_local_transform(&mut self, id: BodyId, local: Transform3D) -> Result<(), TwinError>;

    /// Place `id` at `world`, whatever its parent.
    ///
    /// # Errors
    ///
    /// [`TwinError::UnknownBody`] for a stale handle.
    fn set_world_transform(&mut self, id: BodyId, world: Transform3D) -> Result<(), TwinError>;

    /// First body called `name`.
    fn find(&self, name: &str) -> Option<BodyId> {
        self.bodies()
            .into_iter()
            .find(|&id| self.name(id) == Some(name))
    }

    /// Direct children of `id`, in scene order.
    fn children(&self, id: BodyId) -> Vec<BodyId> {
        self.bodies()
            .into_iter()
            .filter(|&b| self.parent(b) == Some(id))
            .collect()
    }
}

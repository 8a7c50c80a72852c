//! Body-against-body overlap queries.

use asrs_hal::Scene;
use asrs_perception::Bvh;
use asrs_types::BodyId;

/// World-space hierarchy for one body, `None` for non-mesh or unknown ids.
pub fn body_bvh(scene: &dyn Scene, id: BodyId) -> Option<Bvh> {
    scene.world_triangles(id).map(Bvh::build)
}

/// Whether any leaf triangle bounds of `a` and `b` overlap.
///
/// Both hierarchies are rebuilt from the current poses on every call.
pub fn overlaps(scene: &dyn Scene, a: BodyId, b: BodyId) -> bool {
    match (body_bvh(scene, a), body_bvh(scene, b)) {
        (Some(lhs), Some(rhs)) => lhs.overlaps(&rhs),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asrs_hal::SimScene;
    use asrs_perception::Vec3;

    fn cube() -> Vec3 {
        Vec3::new(0.5, 0.5, 0.5)
    }

    #[test]
    fn overlap_is_symmetric() {
        let mut scene = SimScene::new();
        let a = scene.add_box("A", cube(), Vec3::zero());
        let b = scene.add_box("B", cube(), Vec3::new(0.8, 0.0, 0.0));
        let c = scene.add_box("C", cube(), Vec3::new(3.0, 0.0, 0.0));

        assert!(overlaps(&scene, a, b));
        assert!(overlaps(&scene, b, a));
        assert!(!overlaps(&scene, a, c));
        assert!(!overlaps(&scene, c, a));
    }

    #[test]
    fn non_mesh_and_unknown_bodies_never_overlap() {
        let mut scene = SimScene::new();
        let a = scene.add_box("A", cube(), Vec3::zero());
        let empty = scene.add_empty("Locator", Vec3::zero());

        assert!(!overlaps(&scene, a, empty));
        assert!(!overlaps(&scene, empty, a));
        assert!(!overlaps(&scene, a, BodyId(99)));
    }

    #[test]
    fn queries_follow_the_current_pose() {
        let mut scene = SimScene::new();
        let a = scene.add_box("A", cube(), Vec3::zero());
        let b = scene.add_box("B", cube(), Vec3::new(3.0, 0.0, 0.0));
        assert!(!overlaps(&scene, a, b));

        scene
            .set_local_transform(
                b,
                asrs_perception::Transform3D::from_translation(Vec3::new(0.9, 0.0, 0.0)),
            )
            .unwrap();
        assert!(overlaps(&scene, a, b));
    }
}

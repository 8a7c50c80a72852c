//! Bounding-volume hierarchy over world-space triangles.
//!
//! The virtual sensors do not need exact triangle–triangle intersection:
//! two surfaces "touch" when the bounding boxes of some triangle of each
//! overlap.  The hierarchy only prunes the pair search; the answer is the
//! same as testing every triangle pair, so it does not depend on how the
//! trees were split and `a.overlaps(&b) == b.overlaps(&a)` always holds.
//!
//! # Key types
//!
//! | Type | Role |
//! |------|------|
//! | [`Aabb`]     | An axis-aligned bounding box.                     |
//! | [`Triangle`] | A world-space triangle.                           |
//! | [`Bvh`]      | Binary hierarchy; answers overlap with another.   |
//!
//! # Example
//!
//! ```rust
//! use asrs_perception::bvh::{Bvh, Triangle};
//! use asrs_perception::transform::Vec3;
//!
//! let a = Bvh::build(vec![Triangle::new(
//!     Vec3::new(0.0, 0.0, 0.0),
//!     Vec3::new(1.0, 0.0, 0.0),
//!     Vec3::new(0.0, 1.0, 0.0),
//! )]);
//! let b = Bvh::build(vec![Triangle::new(
//!     Vec3::new(0.5, 0.5, -1.0),
//!     Vec3::new(0.5, 0.5, 1.0),
//!     Vec3::new(2.0, 2.0, 0.0),
//! )]);
//! assert!(a.overlaps(&b));
//! assert!(b.overlaps(&a));
//! ```

use tracing::trace;

use crate::transform::{Transform3D, Vec3};

/// Triangles per leaf before a node is split.
pub const DEFAULT_LEAF_SIZE: usize = 4;

// ────────────────────────────────────────────────────────────────────────────
// Aabb
// ────────────────────────────────────────────────────────────────────────────

/// An axis-aligned bounding box, defined by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create a bounding box from two opposite corners, normalising them so
    /// that `min ≤ max` per axis.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// An inverted box that any `expand` call replaces.
    pub fn empty() -> Self {
        Self {
            min: Vec3::new(f32::MAX, f32::MAX, f32::MAX),
            max: Vec3::new(f32::MIN, f32::MIN, f32::MIN),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn expand(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn expand_point(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn centre(&self) -> Vec3 {
        self.min.add(self.max).scale(0.5)
    }

    /// Index of the longest axis (0 = X, 1 = Y, 2 = Z).
    pub fn longest_axis(&self) -> usize {
        let d = self.max.sub(self.min);
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// True when the point lies inside or on the boundary of the box.
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// True when `other` overlaps (intersects or touches) this box.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Triangle
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb {
            min: self.a.min(self.b).min(self.c),
            max: self.a.max(self.b).max(self.c),
        }
    }

    pub fn centroid(&self) -> Vec3 {
        self.a.add(self.b).add(self.c).scale(1.0 / 3.0)
    }

    /// This triangle with every vertex mapped through `t`.
    pub fn transformed(&self, t: &Transform3D) -> Self {
        Self::new(
            t.transform_point(self.a),
            t.transform_point(self.b),
            t.transform_point(self.c),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bvh
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum NodeKind {
    /// Range into `Bvh::order`.
    Leaf { start: usize, count: usize },
    Inner { left: usize, right: usize },
}

#[derive(Debug)]
struct BvhNode {
    bounds: Aabb,
    kind: NodeKind,
}

/// A binary bounding-volume hierarchy over a triangle soup.
///
/// Built top-down by splitting at the median centroid along the longest
/// axis.  The hierarchy is immutable: rebuild it whenever the triangles
/// move.
#[derive(Debug)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    /// Per-triangle bounds, indexed by triangle.
    tri_bounds: Vec<Aabb>,
    /// Triangle indices, grouped so every leaf owns a contiguous range.
    order: Vec<usize>,
}

impl Bvh {
    /// Build a hierarchy with [`DEFAULT_LEAF_SIZE`] triangles per leaf.
    pub fn build(triangles: Vec<Triangle>) -> Self {
        Self::with_leaf_size(triangles, DEFAULT_LEAF_SIZE)
    }

    /// Build a hierarchy with at most `leaf_size` triangles per leaf
    /// (clamped to at least one).
    pub fn with_leaf_size(triangles: Vec<Triangle>, leaf_size: usize) -> Self {
        let leaf_size = leaf_size.max(1);
        let tri_bounds: Vec<Aabb> = triangles.iter().map(Triangle::bounds).collect();
        let centroids: Vec<Vec3> = triangles.iter().map(Triangle::centroid).collect();
        let mut order: Vec<usize> = (0..triangles.len()).collect();
        let mut nodes = Vec::new();

        if !order.is_empty() {
            let len = order.len();
            build_node(&mut nodes, &tri_bounds, &centroids, &mut order, 0, len, leaf_size);
        }

        trace!(triangles = triangles.len(), nodes = nodes.len(), "bvh built");
        Self {
            nodes,
            tri_bounds,
            order,
        }
    }

    /// Number of triangles in the hierarchy.
    pub fn len(&self) -> usize {
        self.tri_bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tri_bounds.is_empty()
    }

    /// Bounds of the whole surface, `None` when empty.
    pub fn bounds(&self) -> Option<Aabb> {
        self.nodes.first().map(|n| n.bounds)
    }

    /// True when some triangle of `self` and some triangle of `other` have
    /// overlapping bounding boxes.  An empty hierarchy overlaps nothing.
    pub fn overlaps(&self, other: &Bvh) -> bool {
        if self.nodes.is_empty() || other.nodes.is_empty() {
            return false;
        }

        let mut stack = vec![(0usize, 0usize)];
        while let Some((i, j)) = stack.pop() {
            let a = &self.nodes[i];
            let b = &other.nodes[j];
            if !a.bounds.overlaps(&b.bounds) {
                continue;
            }
            match (&a.kind, &b.kind) {
                (
                    NodeKind::Leaf { start: sa, count: ca },
                    NodeKind::Leaf { start: sb, count: cb },
                ) => {
                    if self.leaves_touch(*sa, *ca, other, *sb, *cb) {
                        return true;
                    }
                }
                (NodeKind::Inner { left, right }, NodeKind::Leaf { .. }) => {
                    stack.push((*left, j));
                    stack.push((*right, j));
                }
                (NodeKind::Leaf { .. }, NodeKind::Inner { left, right }) => {
                    stack.push((i, *left));
                    stack.push((i, *right));
                }
                (
                    NodeKind::Inner { left: al, right: ar },
                    NodeKind::Inner { left: bl, right: br },
                ) => {
                    stack.push((*al, *bl));
                    stack.push((*al, *br));
                    stack.push((*ar, *bl));
                    stack.push((*ar, *br));
                }
            }
        }
        false
    }

    fn leaves_touch(&self, sa: usize, ca: usize, other: &Bvh, sb: usize, cb: usize) -> bool {
        self.order[sa..sa + ca].iter().any(|&ta| {
            let ba = &self.tri_bounds[ta];
            other.order[sb..sb + cb]
                .iter()
                .any(|&tb| ba.overlaps(&other.tri_bounds[tb]))
        })
    }
}

/// Recursively build the node covering `order[start..end]`; returns its
/// index in `nodes`.
fn build_node(
    nodes: &mut Vec<BvhNode>,
    tri_bounds: &[Aabb],
    centroids: &[Vec3],
    order: &mut [usize],
    start: usize,
    end: usize,
    leaf_size: usize,
) -> usize {
    let mut bounds = Aabb::empty();
    let mut centroid_bounds = Aabb::empty();
    for &t in &order[start..end] {
        bounds.expand(&tri_bounds[t]);
        centroid_bounds.expand_point(centroids[t]);
    }

    let index = nodes.len();
    let count = end - start;
    nodes.push(BvhNode {
        bounds,
        kind: NodeKind::Leaf { start, count },
    });
    if count <= leaf_size {
        return index;
    }

    let axis = centroid_bounds.longest_axis();
    let mid = start + count / 2;
    order[start..end].select_nth_unstable_by(count / 2, |&p, &q| {
        centroids[p].get(axis).total_cmp(&centroids[q].get(axis))
    });

    let left = build_node(nodes, tri_bounds, centroids, order, start, mid, leaf_size);
    let right = build_node(nodes, tri_bounds, centroids, order, mid, end, leaf_size);
    nodes[index].kind = NodeKind::Inner { left, right };
    index
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

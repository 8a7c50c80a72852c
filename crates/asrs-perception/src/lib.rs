//! `asrs-perception` – geometry for the virtual sensors.
//!
//! Everything the twin needs to turn scene meshes into sensor readings,
//! without knowing anything about the scene itself.
//!
//! # Modules
//!
//! - [`transform`] – [`Vec3`][transform::Vec3],
//!   [`Quaternion`][transform::Quaternion] and
//!   [`Transform3D`][transform::Transform3D]: rigid-body poses, composition
//!   and inversion used to reparent pallets without moving them.
//! - [`bvh`] – [`Bvh`][bvh::Bvh]: a bounding-volume hierarchy over
//!   world-space [`Triangle`][bvh::Triangle]s answering "do these two
//!   surfaces come close enough to register".

pub mod bvh;
pub mod transform;

pub use bvh::{Aabb, Bvh, Triangle};
pub use transform::{Quaternion, Transform3D, Vec3};

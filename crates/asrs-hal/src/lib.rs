//! `asrs-hal` – the twin's view of the simulated rack.
//!
//! The 3-D scene (meshes, poses, hierarchy) is an external collaborator.
//! This crate defines the seam the rest of the twin talks through and an
//! in-process implementation of it.
//!
//! # Modules
//!
//! - [`scene`] – [`Scene`][scene::Scene]: body lookup, poses, world-space
//!   triangles, and the reparenting primitives used for pallet pickup.
//! - [`sim`] – [`SimScene`][sim::SimScene]: a flat in-memory scene with a
//!   builder API, used by tests and headless runs.
//! - [`scene_file`] – TOML scene descriptions loaded into a
//!   [`SimScene`][sim::SimScene].

pub mod scene;
pub mod scene_file;
pub mod sim;

pub use scene::Scene;
pub use scene_file::SceneFileError;
pub use sim::SimScene;

//! Four-corner pallet alignment.

use asrs_types::BodyId;

use crate::scanner::Scanner;

/// The pallet all four corner sensors agree on, if any.
///
/// Every corner is sensed even once a disagreement is certain, so the
/// per-sensor debug log always shows all four.
pub fn is_aligned(scanner: &Scanner<'_>, corners: &[String; 4]) -> Option<BodyId> {
    let hits = corners.each_ref().map(|c| scanner.sense(c));
    let first = hits[0]?;
    hits.iter().all(|h| *h == Some(first)).then_some(first)
}

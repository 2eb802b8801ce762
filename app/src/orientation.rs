// ==============================================================================
// orientation.rs - Strand Orientation Normalizer
// ==============================================================================
// Description: Rewrites reverse-strand coordinates into 5' -> 3' order
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Feature tables list a minus-strand interval as "end<TAB>start", so after
// this step `start` is the biological 5' boundary and may exceed `end`.
// ==============================================================================

use crate::models::{Feature, Strand};

/// Swap start/end of a reverse-strand feature; other strands pass through
pub fn normalize(mut feature: Feature) -> Feature {
    if feature.strand == Strand::Reverse {
        std::mem::swap(&mut feature.start, &mut feature.end);
    }
    feature
}

/// Normalize a whole feature stream, keeping order
pub fn normalize_all(features: Vec<Feature>) -> Vec<Feature> {
    features.into_iter().map(normalize).collect()
}

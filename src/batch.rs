//! Distortion tables over many projections.
//!
//! Cancellation is cooperative: the flag is read before each projection, and results finished
//! before it was raised are kept.
use std::sync::atomic::{AtomicBool, Ordering};

use crate::acceptance::AcceptanceThresholds;
use crate::analyzer::{AnalyzerBuilder, DistortionParameters};
use crate::proj::Projection;

/// Analyses `projections` in order. Entries not reached before `cancel` was set are `None`.
pub fn analyze(
    projections: &[Projection],
    builder: &AnalyzerBuilder,
    thresholds: &AcceptanceThresholds,
    cancel: &AtomicBool,
) -> Vec<Option<DistortionParameters>> {
    let mut analyzer = builder.build();
    let mut results = Vec::with_capacity(projections.len());
    for (i, projection) in projections.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            log::info!("Batch analysis cancelled after {i} of {} projections", projections.len());
            break;
        }
        results.push(Some(analyzer.parameters(projection, thresholds)));
        analyzer.invalidate();
    }
    results.resize(projections.len(), None);
    results
}

/// Like [`analyze`], one rayon task per projection, each on its own copy of the projection.
#[cfg(feature = "parallel")]
pub fn analyze_parallel(
    projections: &[Projection],
    builder: &AnalyzerBuilder,
    thresholds: &AcceptanceThresholds,
    cancel: &AtomicBool,
) -> Vec<Option<DistortionParameters>> {
    use rayon::prelude::*;

    let results: Vec<_> = projections
        .par_iter()
        .map(|projection| {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            let projection = projection.clone();
            Some(builder.build().parameters(&projection, thresholds))
        })
        .collect();
    if cancel.load(Ordering::Relaxed) {
        log::info!(
            "Parallel batch analysis cancelled, {} of {} projections done",
            results.iter().flatten().count(),
            projections.len()
        );
    }
    results
}

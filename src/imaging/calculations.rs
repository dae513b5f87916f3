//! Pure calculation functions for the compression search.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::{Quality, SearchPlan, Trial};

/// Uniform scale factor that fits `natural` inside a `max_dimension` box.
///
/// Clamped to 1.0 so an image is never upscaled.
///
/// # Examples
/// ```
/// # use lostfound_compress::imaging::scale_factor;
/// assert_eq!(scale_factor((4000, 3000), 1024), 0.256);
/// assert_eq!(scale_factor((100, 100), 1024), 1.0);
/// ```
pub fn scale_factor(natural: (u32, u32), max_dimension: u32) -> f64 {
    let (w, h) = natural;
    let by_width = max_dimension as f64 / w as f64;
    let by_height = max_dimension as f64 / h as f64;
    by_width.min(by_height).min(1.0)
}

/// Target render size for a trial at `max_dimension`.
///
/// Each side is `round(natural * scale)`, floored at 1px so a very thin
/// image never produces an empty surface.
///
/// # Examples
/// ```
/// # use lostfound_compress::imaging::target_dimensions;
/// assert_eq!(target_dimensions((4000, 3000), 1024), (1024, 768));
/// assert_eq!(target_dimensions((3000, 4000), 640), (480, 640));
/// ```
pub fn target_dimensions(natural: (u32, u32), max_dimension: u32) -> (u32, u32) {
    let (w, h) = natural;
    let scale = scale_factor(natural, max_dimension);
    let tw = ((w as f64 * scale).round() as u32).max(1);
    let th = ((h as f64 * scale).round() as u32).max(1);
    (tw, th)
}

/// Lazily yields the trials of a [`SearchPlan`] in priority order.
///
/// Largest dimension first; within a dimension, highest quality first.
/// Quality resets to the plan's initial value whenever the dimension drops.
#[derive(Debug, Clone)]
pub struct Trials {
    plan: SearchPlan,
    next: Option<Trial>,
}

impl Trials {
    pub fn new(plan: SearchPlan) -> Self {
        let next = (!plan.is_empty()).then_some(Trial {
            max_dimension: plan.initial_max_dimension,
            quality: plan.initial_quality,
        });
        Self { plan, next }
    }

    fn advance(&self, current: Trial) -> Option<Trial> {
        let plan = &self.plan;
        let lower_quality = current
            .quality
            .value()
            .checked_sub(plan.quality_step)
            .filter(|q| *q >= plan.min_quality.value());

        if let Some(q) = lower_quality {
            return Some(Trial {
                max_dimension: current.max_dimension,
                quality: Quality::new(q),
            });
        }

        current
            .max_dimension
            .checked_sub(plan.dimension_step)
            .filter(|d| *d >= plan.min_max_dimension)
            .map(|d| Trial {
                max_dimension: d,
                quality: plan.initial_quality,
            })
    }
}

impl Iterator for Trials {
    type Item = Trial;

    fn next(&mut self) -> Option<Trial> {
        let current = self.next?;
        self.next = self.advance(current);
        Some(current)
    }
}

impl SearchPlan {
    /// Iterate this plan's trials in the order they are attempted.
    pub fn trials(&self) -> Trials {
        Trials::new(*self)
    }
}

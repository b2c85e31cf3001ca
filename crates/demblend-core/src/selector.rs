//! Minimal-error selection across the candidates of a frame.

use crate::evaluator::Evaluation;

/// Keeps the item with the lowest mean seen so far.
///
/// Only a strictly lower mean replaces the current best, so on ties the
/// first offered item (the simpler blend) wins. A NaN mean never wins.
#[derive(Debug, Clone)]
pub struct BestSelector<T = Evaluation> {
    best: Option<(f64, T)>,
}

impl<T> Default for BestSelector<T> {
    fn default() -> Self {
        Self { best: None }
    }
}

impl<T> BestSelector<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer `item` scored by `mean`. Returns true if it became the best.
    pub fn offer(&mut self, mean: f64, item: T) -> bool {
        if mean < self.best_mean() {
            self.best = Some((mean, item));
            true
        } else {
            false
        }
    }

    /// Mean of the current best, `+inf` if nothing was selected.
    pub fn best_mean(&self) -> f64 {
        self.best.as_ref().map_or(f64::INFINITY, |(mean, _)| *mean)
    }

    pub fn best(&self) -> Option<&T> {
        self.best.as_ref().map(|(_, item)| item)
    }

    pub fn into_best(self) -> Option<T> {
        self.best.map(|(_, item)| item)
    }
}

impl BestSelector<Evaluation> {
    /// Offer an evaluated candidate.
    pub fn offer_evaluation(&mut self, evaluation: Evaluation) -> bool {
        let mean = evaluation.mean();
        self.offer(mean, evaluation)
    }
}

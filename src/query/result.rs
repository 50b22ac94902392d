//! Ordered result container for similarity queries.

use crate::types::TiesPolicy;

/// One query match: the object and its distance to the query centre
#[derive(Debug, Clone)]
pub struct ResultPair<O> {
    /// The matched object
    pub object: O,
    /// Distance from the query object
    pub distance: f64,
}

#[derive(Debug, Clone, Copy)]
enum ResultMode {
    /// Unbounded, admits everything within the query radius
    Range { radius: f64 },
    /// Bounded by k with the configured ties policy
    Nearest { k: usize, ties: TiesPolicy },
}

/// An ordered multi-set of `(object, distance)` pairs.
///
/// Three modes share one container: range results are bounded by the query
/// radius, k-NN results by k with either keep-first or keep-all ties
/// handling. Iteration is always ascending by distance.
#[derive(Debug, Clone)]
pub struct ResultSet<O> {
    mode: ResultMode,
    pairs: Vec<ResultPair<O>>,
    complete: bool,
}

impl<O> ResultSet<O> {
    /// Result set for a range query with the given radius
    pub fn range(radius: f64) -> Self {
        Self {
            mode: ResultMode::Range { radius },
            pairs: Vec::new(),
            complete: true,
        }
    }

    /// Result set for a k-NN query
    pub fn nearest(k: usize, ties: TiesPolicy) -> Self {
        Self {
            mode: ResultMode::Nearest { k, ties },
            pairs: Vec::with_capacity(k),
            complete: true,
        }
    }

    /// Offer a candidate pair; it is admitted or ignored per the mode's rule
    pub fn add(&mut self, object: O, distance: f64) {
        match self.mode {
            ResultMode::Range { radius } => {
                if distance <= radius {
                    self.insert_sorted(object, distance);
                }
            }
            ResultMode::Nearest { k: 0, .. } => {}
            ResultMode::Nearest { k, ties } => match ties {
                TiesPolicy::KeepFirst => {
                    if self.pairs.len() < k {
                        self.insert_sorted(object, distance);
                    } else if distance < self.pairs[k - 1].distance {
                        self.insert_sorted(object, distance);
                        self.pairs.truncate(k);
                    }
                }
                TiesPolicy::KeepAll => {
                    if self.pairs.len() < k || distance <= self.pairs[k - 1].distance {
                        self.insert_sorted(object, distance);
                        // Purge entries strictly beyond the k-th distance
                        let kth = self.pairs[k.min(self.pairs.len()) - 1].distance;
                        while self.pairs.len() > k
                            && self.pairs.last().map(|p| p.distance > kth).unwrap_or(false)
                        {
                            self.pairs.pop();
                        }
                    }
                }
            },
        }
    }

    /// Stable sorted insert: ties land after earlier arrivals
    fn insert_sorted(&mut self, object: O, distance: f64) {
        let at = self.pairs.partition_point(|p| p.distance <= distance);
        self.pairs.insert(at, ResultPair { object, distance });
    }

    /// The pruning radius implied by the current contents: the query
    /// radius for range mode, the k-th distance for k-NN mode (infinite
    /// while fewer than k results are held)
    pub fn current_radius(&self) -> f64 {
        match self.mode {
            ResultMode::Range { radius } => radius,
            ResultMode::Nearest { k, .. } => {
                if self.pairs.len() < k.max(1) {
                    f64::INFINITY
                } else {
                    self.pairs[k - 1].distance
                }
            }
        }
    }

    /// Number of matches held
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when no match was admitted
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Ascending-by-distance iteration
    pub fn iter(&self) -> std::slice::Iter<'_, ResultPair<O>> {
        self.pairs.iter()
    }

    /// False when the producing query was cancelled before finishing
    pub fn complete(&self) -> bool {
        self.complete
    }

    pub(crate) fn mark_incomplete(&mut self) {
        self.complete = false;
    }
}

impl<O> IntoIterator for ResultSet<O> {
    type Item = ResultPair<O>;
    type IntoIter = std::vec::IntoIter<ResultPair<O>>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.into_iter()
    }
}

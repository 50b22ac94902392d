//! Per-level tree statistics for evaluating disk-access behaviour.

/// Node, entry and covering-radius counters aggregated per tree level.
///
/// Level 0 is the root. Out-of-range levels are silently ignored on update
/// and report zero on read, so callers can feed a walk without re-checking
/// the height.
#[derive(Debug, Clone)]
pub struct LevelStatistics {
    radius: Vec<f64>,
    nodes: Vec<u64>,
    entries: Vec<u64>,
    summarized: bool,
}

impl LevelStatistics {
    /// Create counters for a tree of the given height
    pub fn new(height: usize) -> Self {
        Self {
            radius: vec![0.0; height],
            nodes: vec![0; height],
            entries: vec![0; height],
            summarized: false,
        }
    }

    /// Number of levels tracked
    pub fn height(&self) -> usize {
        self.nodes.len()
    }

    /// Record one entry with its covering radius at `level`
    pub fn add_entry(&mut self, radius: f64, level: usize) {
        if level < self.height() {
            self.radius[level] += radius;
            self.entries[level] += 1;
        }
    }

    /// Record one node at `level`
    pub fn add_node(&mut self, level: usize) {
        if level < self.height() {
            self.nodes[level] += 1;
        }
    }

    /// Number of nodes recorded at `level`
    pub fn nodes(&self, level: usize) -> u64 {
        self.nodes.get(level).copied().unwrap_or(0)
    }

    /// Number of entries recorded at `level`
    pub fn entries(&self, level: usize) -> u64 {
        self.entries.get(level).copied().unwrap_or(0)
    }

    /// Mean covering radius at `level`; only meaningful after
    /// [`summarize`](Self::summarize)
    pub fn average_radius(&self, level: usize) -> f64 {
        self.radius.get(level).copied().unwrap_or(0.0)
    }

    /// Turn the accumulated radius sums into per-level means
    pub fn summarize(&mut self) {
        if self.summarized {
            return;
        }
        for level in 0..self.height() {
            if self.entries[level] != 0 {
                self.radius[level] /= self.entries[level] as f64;
            } else {
                self.radius[level] = 0.0;
            }
        }
        self.summarized = true;
    }
}

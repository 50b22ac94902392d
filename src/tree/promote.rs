//! Promotion and partition policies used by node splits.
//!
//! A split gathers the node's entries plus the incoming object into a set
//! `S`, computes all pairwise distances once into a half-matrix cache, and
//! chooses two representatives by the configured policy. The cache keeps
//! split cost to `O(|S|^2)` distance evaluations regardless of policy.

use crate::error::{ArboretumError, Result};
use crate::types::PromotionPolicy;
use rand::Rng;

/// Half-matrix distance cache over a split set.
///
/// Only `i < j` is stored since the metric is symmetric and `d(i, i) = 0`.
pub(crate) struct DistanceCache {
    n: usize,
    d: Vec<f64>,
}

impl DistanceCache {
    /// Compute all pairwise distances of `items`
    pub fn new<O, F>(items: &[O], dist: F) -> Self
    where
        F: Fn(&O, &O) -> f64,
    {
        let n = items.len();
        let mut d = vec![0.0; n * n.saturating_sub(1) / 2];
        for i in 0..n {
            for j in (i + 1)..n {
                d[Self::index(n, i, j)] = dist(&items[i], &items[j]);
            }
        }
        Self { n, d }
    }

    fn index(n: usize, i: usize, j: usize) -> usize {
        debug_assert!(i < j && j < n);
        i * (2 * n - i - 1) / 2 + (j - i - 1)
    }

    /// Cached distance between items `i` and `j`
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return 0.0;
        }
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        self.d[Self::index(self.n, a, b)]
    }

    /// Number of items covered by the cache
    pub fn len(&self) -> usize {
        self.n
    }
}

/// Choose two representatives from the split set by the given policy
pub(crate) fn promote(policy: PromotionPolicy, cache: &DistanceCache) -> (usize, usize) {
    match policy {
        PromotionPolicy::Random => promote_random(cache.len()),
        PromotionPolicy::MinMaxRadius => promote_min_max(cache),
        PromotionPolicy::MstSplit => promote_mst(cache),
    }
}

fn promote_random(n: usize) -> (usize, usize) {
    debug_assert!(n >= 2);
    let mut rng = rand::thread_rng();
    let p = rng.gen_range(0..n);
    let mut q = rng.gen_range(0..n - 1);
    if q >= p {
        q += 1;
    }
    (p, q)
}

/// Try every unordered pair, assign the other elements to the nearer
/// representative and keep the pair minimising the larger covering radius
fn promote_min_max(cache: &DistanceCache) -> (usize, usize) {
    let n = cache.len();
    let mut best = (0, 1);
    let mut best_radius = f64::INFINITY;

    for p in 0..n {
        for q in (p + 1)..n {
            let mut rp = 0.0f64;
            let mut rq = 0.0f64;
            for k in 0..n {
                if k == p || k == q {
                    continue;
                }
                let dp = cache.get(p, k);
                let dq = cache.get(q, k);
                if dp <= dq {
                    rp = rp.max(dp);
                } else {
                    rq = rq.max(dq);
                }
            }
            let larger = rp.max(rq);
            if larger < best_radius {
                best_radius = larger;
                best = (p, q);
            }
        }
    }
    best
}

/// Build the minimum spanning tree of the split set, cut its longest edge
/// and promote the element of each component minimising the maximal
/// distance within that component
fn promote_mst(cache: &DistanceCache) -> (usize, usize) {
    let n = cache.len();
    debug_assert!(n >= 2);

    // Prim's algorithm from item 0
    let mut in_tree = vec![false; n];
    let mut best_dist = vec![f64::INFINITY; n];
    let mut best_src = vec![0usize; n];
    let mut edges: Vec<(usize, usize, f64)> = Vec::with_capacity(n - 1);

    in_tree[0] = true;
    for j in 1..n {
        best_dist[j] = cache.get(0, j);
    }
    for _ in 1..n {
        let mut next = usize::MAX;
        let mut next_d = f64::INFINITY;
        for j in 0..n {
            if !in_tree[j] && best_dist[j] < next_d {
                next_d = best_dist[j];
                next = j;
            }
        }
        in_tree[next] = true;
        edges.push((best_src[next], next, next_d));
        for j in 0..n {
            if !in_tree[j] && cache.get(next, j) < best_dist[j] {
                best_dist[j] = cache.get(next, j);
                best_src[j] = next;
            }
        }
    }

    // Cut the longest edge
    let cut = edges
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let (cut_u, cut_v, _) = edges[cut];

    // Components of the MST minus the cut edge, found from cut_u
    let mut adjacency = vec![Vec::new(); n];
    for (i, &(u, v, _)) in edges.iter().enumerate() {
        if i == cut {
            continue;
        }
        adjacency[u].push(v);
        adjacency[v].push(u);
    }
    let mut in_first = vec![false; n];
    let mut stack = vec![cut_u];
    in_first[cut_u] = true;
    while let Some(u) = stack.pop() {
        for &v in &adjacency[u] {
            if !in_first[v] {
                in_first[v] = true;
                stack.push(v);
            }
        }
    }
    debug_assert!(!in_first[cut_v]);

    let first: Vec<usize> = (0..n).filter(|&i| in_first[i]).collect();
    let second: Vec<usize> = (0..n).filter(|&i| !in_first[i]).collect();
    (component_center(cache, &first), component_center(cache, &second))
}

/// The member minimising its maximal distance to the rest of the component
fn component_center(cache: &DistanceCache, members: &[usize]) -> usize {
    let mut best = members[0];
    let mut best_radius = f64::INFINITY;
    for &candidate in members {
        let radius = members
            .iter()
            .map(|&other| cache.get(candidate, other))
            .fold(0.0f64, f64::max);
        if radius < best_radius {
            best_radius = radius;
            best = candidate;
        }
    }
    best
}

/// Distribute the split set between representatives `p` and `q`.
///
/// Each element goes to the nearer representative; ties go to the side
/// with fewer entries. Afterwards the smaller side is topped up with the
/// borderline elements of the other until both meet the minimum
/// occupation, or `SplitImpossible` when that cannot be done.
pub(crate) fn partition(
    cache: &DistanceCache,
    p: usize,
    q: usize,
    min_occupation: usize,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let n = cache.len();
    let mut first = vec![p];
    let mut second = vec![q];

    for k in 0..n {
        if k == p || k == q {
            continue;
        }
        let dp = cache.get(p, k);
        let dq = cache.get(q, k);
        if dp < dq {
            first.push(k);
        } else if dq < dp {
            second.push(k);
        } else if first.len() <= second.len() {
            first.push(k);
        } else {
            second.push(k);
        }
    }

    rebalance(cache, p, q, &mut first, &mut second, min_occupation);
    rebalance(cache, q, p, &mut second, &mut first, min_occupation);

    if first.len() < min_occupation || second.len() < min_occupation {
        return Err(ArboretumError::SplitImpossible {
            min_occupation,
        });
    }
    Ok((first, second))
}

/// Move the donor elements nearest to `target_rep` into the deficient side
fn rebalance(
    cache: &DistanceCache,
    target_rep: usize,
    donor_rep: usize,
    target: &mut Vec<usize>,
    donor: &mut Vec<usize>,
    min_occupation: usize,
) {
    while target.len() < min_occupation && donor.len() > min_occupation {
        let taken = donor
            .iter()
            .enumerate()
            .filter(|&(_, &k)| k != donor_rep)
            .min_by(|(_, &a), (_, &b)| {
                cache
                    .get(target_rep, a)
                    .partial_cmp(&cache.get(target_rep, b))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(pos, _)| pos);
        match taken {
            Some(pos) => target.push(donor.remove(pos)),
            None => break,
        }
    }
}

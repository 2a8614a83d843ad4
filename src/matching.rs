//! Bipartite matching.
//!
//! The chain partition of the disjoint value DAG needs an exact
//! maximum-cardinality matching on a bipartite graph whose two sides are
//! both copies of the DAG's node set. Edge weights are accepted so the
//! interface mirrors a general utility-maximizing matcher, but all
//! callers in this crate use unit weights, for which cardinality and
//! utility coincide; the implementation is a plain augmenting-path
//! search.

/// Builder and solver for one matching problem.
pub struct BipartiteMatcher {
    n_left: usize,
    n_right: usize,
    adj: Vec<Vec<(usize, u32)>>,
}

/// The result of a solved matching.
pub struct Matching {
    left_to_right: Vec<Option<usize>>,
    right_to_left: Vec<Option<usize>>,
}

impl BipartiteMatcher {
    /// Create a problem with `n_left` left and `n_right` right vertices.
    pub fn new(n_left: usize, n_right: usize) -> Self {
        Self {
            n_left,
            n_right,
            adj: vec![Vec::new(); n_left],
        }
    }

    /// Add an edge between left vertex `i` and right vertex `j` with the
    /// given weight.
    pub fn add(&mut self, i: usize, j: usize, weight: u32) {
        debug_assert!(i < self.n_left && j < self.n_right, "edge out of range");
        self.adj[i].push((j, weight));
    }

    /// Solve for a maximum-cardinality matching.
    pub fn solve(&self) -> Matching {
        let mut left_to_right: Vec<Option<usize>> = vec![None; self.n_left];
        let mut right_to_left: Vec<Option<usize>> = vec![None; self.n_right];

        for start in 0..self.n_left {
            let mut visited = vec![false; self.n_left];
            self.augment(start, &mut visited, &mut left_to_right, &mut right_to_left);
        }

        Matching {
            left_to_right,
            right_to_left,
        }
    }

    /// Try to find an augmenting path starting at unmatched left vertex
    /// `l`. Returns true and flips the path if one exists.
    fn augment(
        &self,
        l: usize,
        visited: &mut [bool],
        left_to_right: &mut [Option<usize>],
        right_to_left: &mut [Option<usize>],
    ) -> bool {
        if visited[l] {
            return false;
        }
        visited[l] = true;
        for &(r, _weight) in &self.adj[l] {
            let free = match right_to_left[r] {
                None => true,
                Some(other) => self.augment(other, visited, left_to_right, right_to_left),
            };
            if free {
                left_to_right[l] = Some(r);
                right_to_left[r] = Some(l);
                return true;
            }
        }
        false
    }
}

impl Matching {
    /// The right vertex matched to left vertex `i`, if any.
    pub fn matched_right(&self, i: usize) -> Option<usize> {
        self.left_to_right[i]
    }

    /// The left vertex matched to right vertex `j`, if any.
    pub fn matched_left(&self, j: usize) -> Option<usize> {
        self.right_to_left[j]
    }

    /// Number of matched pairs.
    pub fn cardinality(&self) -> usize {
        self.left_to_right.iter().filter(|m| m.is_some()).count()
    }
}

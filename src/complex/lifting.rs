//! Vietoris-Rips Lifting of Point Clouds
//!
//! The Vietoris-Rips complex VR_ε(X) is the clique complex of the ε-graph:
//! - 0-cells are the points in X
//! - an edge [i, j] exists iff d(i, j) ≤ ε
//! - a triangle [i, j, k] exists iff all three pairwise distances are ≤ ε
//!
//! This is the mesh-to-complex step that turns raw geometry into a
//! `CellComplex` the convolution layers can consume. The point coordinates
//! double as the rank-0 input signal.

use ndarray::Array2;
use std::collections::HashSet;
use tracing::debug;

use super::CellComplex;
use crate::error::{ConvError, Result};

/// Vietoris-Rips lifting at a single scale
#[derive(Debug, Clone)]
pub struct VietorisRips {
    /// Distance matrix (precomputed)
    distances: Array2<f64>,
    /// Scale parameter ε
    epsilon: f64,
}

impl VietorisRips {
    /// Lift from a precomputed (square, symmetric) distance matrix
    pub fn from_distance_matrix(distances: &Array2<f64>, epsilon: f64) -> Result<Self> {
        if distances.nrows() != distances.ncols() {
            return Err(ConvError::shape(
                "distance matrix columns",
                distances.nrows(),
                distances.ncols(),
            ));
        }
        if !(epsilon >= 0.0) {
            return Err(ConvError::config(format!("epsilon must be non-negative, got {epsilon}")));
        }
        Ok(Self {
            distances: distances.clone(),
            epsilon,
        })
    }

    /// Lift from a point cloud (rows are points)
    pub fn from_points(points: &Array2<f64>, epsilon: f64) -> Result<Self> {
        let distances = Self::compute_distance_matrix(points);
        Self::from_distance_matrix(&distances, epsilon)
    }

    /// Compute Euclidean distance matrix
    fn compute_distance_matrix(points: &Array2<f64>) -> Array2<f64> {
        let n = points.nrows();
        let mut dm = Array2::<f64>::zeros((n, n));

        for i in 0..n {
            for j in i + 1..n {
                let diff = &points.row(i) - &points.row(j);
                let dist = diff.dot(&diff).sqrt();
                dm[[i, j]] = dist;
                dm[[j, i]] = dist;
            }
        }

        dm
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Number of points
    pub fn n_points(&self) -> usize {
        self.distances.nrows()
    }

    /// All edges of the ε-graph
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let n = self.n_points();
        let mut edges = Vec::new();

        for i in 0..n {
            for j in i + 1..n {
                if self.distances[[i, j]] <= self.epsilon {
                    edges.push((i, j));
                }
            }
        }

        edges
    }

    /// All 3-cliques of the ε-graph
    pub fn triangles(&self) -> Vec<(usize, usize, usize)> {
        let n = self.n_points();
        let eps = self.epsilon;
        let mut triangles = Vec::new();

        for i in 0..n {
            for j in i + 1..n {
                if self.distances[[i, j]] > eps {
                    continue;
                }
                for k in j + 1..n {
                    if self.distances[[i, k]] <= eps && self.distances[[j, k]] <= eps {
                        triangles.push((i, j, k));
                    }
                }
            }
        }

        triangles
    }

    /// Count connected components of the ε-graph using Union-Find
    pub fn count_components(&self) -> usize {
        let n = self.n_points();
        let mut parent: Vec<usize> = (0..n).collect();
        let mut rank = vec![0usize; n];

        fn find(parent: &mut [usize], i: usize) -> usize {
            if parent[i] != i {
                parent[i] = find(parent, parent[i]);
            }
            parent[i]
        }

        fn union(parent: &mut [usize], rank: &mut [usize], x: usize, y: usize) {
            let rx = find(parent, x);
            let ry = find(parent, y);
            if rx != ry {
                if rank[rx] < rank[ry] {
                    parent[rx] = ry;
                } else if rank[rx] > rank[ry] {
                    parent[ry] = rx;
                } else {
                    parent[ry] = rx;
                    rank[rx] += 1;
                }
            }
        }

        for (i, j) in self.edges() {
            union(&mut parent, &mut rank, i, j);
        }

        let mut roots = HashSet::new();
        for i in 0..n {
            roots.insert(find(&mut parent, i));
        }
        roots.len()
    }

    /// Build the 2-skeleton as a simplicial `CellComplex`
    pub fn lift(&self) -> Result<CellComplex> {
        let edges = self.edges();
        let triangles = self.triangles();
        debug!(
            points = self.n_points(),
            edges = edges.len(),
            triangles = triangles.len(),
            epsilon = self.epsilon,
            "vietoris-rips lift"
        );
        CellComplex::simplicial(self.n_points(), edges, triangles)
    }
}

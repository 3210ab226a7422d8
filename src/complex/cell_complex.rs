//! Cell Complexes of Dimension ≤ 2
//!
//! Nodes, oriented edges and polygonal faces. A simplicial complex is the
//! special case where every face is a triangle.
//!
//! ## Orientation
//!
//! - An edge `{u, v}` is stored as `(min, max)` and oriented low → high, so
//!   `B_1[min, e] = -1` and `B_1[max, e] = +1`.
//! - A face is a vertex cycle `[v_0, …, v_{k-1}]`. Its boundary walks the
//!   cycle; edge `(v_i, v_{i+1})` enters `B_2` with `+1` when the walk agrees
//!   with the stored edge orientation and `-1` otherwise. For a triangle
//!   `[a < b < c]` this is `∂[a,b,c] = [b,c] - [a,c] + [a,b]`.
//!
//! ## Operators
//!
//! ```text
//! L_0      = B_1 B_1ᵀ                 (up only)
//! L_1^down = B_1ᵀ B_1,  L_1^up = B_2 B_2ᵀ
//! L_2^down = B_2ᵀ B_2,  L_2^up = 0    (no 3-cells)
//! ```

use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use super::{OperatorKind, OperatorSet, SparseOperator};
use crate::error::{ConvError, Result};

/// Immutable 2-dimensional cell complex
#[derive(Debug, Clone)]
pub struct CellComplex {
    n_nodes: usize,
    /// Edges as `(low, high)` vertex pairs, sorted
    edges: Vec<(usize, usize)>,
    /// Faces as vertex cycles
    faces: Vec<Vec<usize>>,
    edge_index: HashMap<(usize, usize), usize>,
}

impl CellComplex {
    /// Build from nodes, edges and polygonal faces.
    ///
    /// Edges are deduplicated, and so are faces listed twice with the same
    /// boundary. Two faces on one vertex set with different boundaries are an
    /// `InvalidCell` error. Face edges missing from `edges` are added, so
    /// the result is always closed under taking boundaries.
    pub fn new(
        n_nodes: usize,
        edges: impl IntoIterator<Item = (usize, usize)>,
        faces: impl IntoIterator<Item = Vec<usize>>,
    ) -> Result<Self> {
        let mut edge_set: BTreeSet<(usize, usize)> = BTreeSet::new();
        for (u, v) in edges {
            edge_set.insert(Self::check_edge(n_nodes, u, v)?);
        }

        let mut checked_faces = Vec::new();
        // vertex set -> boundary edges of the face kept for it
        let mut face_keys: HashMap<Vec<usize>, BTreeSet<(usize, usize)>> = HashMap::new();
        for face in faces {
            if face.len() < 3 {
                return Err(ConvError::InvalidCell(format!(
                    "face {face:?} needs at least 3 vertices"
                )));
            }
            let distinct: BTreeSet<usize> = face.iter().copied().collect();
            if distinct.len() != face.len() {
                return Err(ConvError::InvalidCell(format!("face {face:?} repeats a vertex")));
            }
            let boundary = (0..face.len())
                .map(|i| Self::check_edge(n_nodes, face[i], face[(i + 1) % face.len()]))
                .collect::<Result<BTreeSet<_>>>()?;

            let key: Vec<usize> = distinct.into_iter().collect();
            if let Some(seen) = face_keys.get(&key) {
                if *seen != boundary {
                    return Err(ConvError::InvalidCell(format!(
                        "face {face:?} spans the vertices of an earlier face with a different boundary"
                    )));
                }
                continue;
            }

            let before = edge_set.len();
            edge_set.extend(boundary.iter().copied());
            if edge_set.len() > before {
                debug!(face = ?face, added = edge_set.len() - before, "closed face boundary with new edges");
            }
            face_keys.insert(key, boundary);
            checked_faces.push(face);
        }

        let edges: Vec<(usize, usize)> = edge_set.into_iter().collect();
        let edge_index = edges.iter().enumerate().map(|(i, &e)| (e, i)).collect();

        Ok(Self {
            n_nodes,
            edges,
            faces: checked_faces,
            edge_index,
        })
    }

    /// Simplicial complex from nodes, edges and triangles.
    pub fn simplicial(
        n_nodes: usize,
        edges: impl IntoIterator<Item = (usize, usize)>,
        triangles: impl IntoIterator<Item = (usize, usize, usize)>,
    ) -> Result<Self> {
        let faces = triangles.into_iter().map(|(a, b, c)| {
            let mut t = vec![a, b, c];
            t.sort_unstable();
            t
        });
        Self::new(n_nodes, edges, faces)
    }

    fn check_edge(n_nodes: usize, u: usize, v: usize) -> Result<(usize, usize)> {
        if u == v {
            return Err(ConvError::InvalidCell(format!("self-loop on vertex {u}")));
        }
        if u >= n_nodes || v >= n_nodes {
            return Err(ConvError::InvalidCell(format!(
                "edge ({u}, {v}) references a vertex outside 0..{n_nodes}"
            )));
        }
        Ok((u.min(v), u.max(v)))
    }

    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    pub fn n_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn n_faces(&self) -> usize {
        self.faces.len()
    }

    /// `[n_0, n_1, n_2]`
    pub fn cell_counts(&self) -> Vec<usize> {
        vec![self.n_nodes, self.edges.len(), self.faces.len()]
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    /// Index of edge `{u, v}`, if present
    pub fn edge_id(&self, u: usize, v: usize) -> Option<usize> {
        self.edge_index.get(&(u.min(v), u.max(v))).copied()
    }

    /// Signed node-to-edge incidence `B_1` (`n_0 × n_1`)
    pub fn boundary_1(&self) -> Result<SparseOperator> {
        let triplets = self
            .edges
            .iter()
            .enumerate()
            .flat_map(|(e, &(lo, hi))| [(lo, e, -1.0), (hi, e, 1.0)]);
        SparseOperator::from_triplets(self.n_nodes, self.edges.len(), triplets)
    }

    /// Signed edge-to-face incidence `B_2` (`n_1 × n_2`)
    pub fn boundary_2(&self) -> Result<SparseOperator> {
        let mut triplets = Vec::new();
        for (f, face) in self.faces.iter().enumerate() {
            for i in 0..face.len() {
                let (u, v) = (face[i], face[(i + 1) % face.len()]);
                let e = self.edge_id(u, v).ok_or_else(|| {
                    ConvError::InvalidCell(format!("face {f} uses unknown edge ({u}, {v})"))
                })?;
                let sign = if u < v { 1.0 } else { -1.0 };
                triplets.push((e, f, sign));
            }
        }
        SparseOperator::from_triplets(self.edges.len(), self.faces.len(), triplets)
    }

    /// Compute every operator the convolution layers may ask for.
    pub fn operator_set(&self) -> Result<OperatorSet> {
        let b1 = self.boundary_1()?;
        let b2 = self.boundary_2()?;
        let b1t = b1.transpose();
        let b2t = b2.transpose();

        let l0 = b1.compose(&b1t)?;
        let l1_down = b1t.compose(&b1)?;
        let l1_up = b2.compose(&b2t)?;
        let l2_down = b2t.compose(&b2)?;
        let l2_up = SparseOperator::zeros(self.faces.len(), self.faces.len());

        let a0 = off_diagonal_pattern(&[&l0])?;
        let a1 = off_diagonal_pattern(&[&l1_down, &l1_up])?;
        let a2 = off_diagonal_pattern(&[&l2_down])?;

        let mut set = OperatorSet::new(self.cell_counts());
        set.insert(OperatorKind::Boundary(1), b1)?;
        set.insert(OperatorKind::Boundary(2), b2)?;

        set.insert(OperatorKind::LaplacianDown(0), SparseOperator::zeros(self.n_nodes, self.n_nodes))?;
        set.insert(OperatorKind::LaplacianUp(0), l0.clone())?;
        set.insert(OperatorKind::LaplacianHodge(0), l0)?;

        set.insert(OperatorKind::LaplacianHodge(1), l1_down.add(&l1_up)?)?;
        set.insert(OperatorKind::LaplacianDown(1), l1_down)?;
        set.insert(OperatorKind::LaplacianUp(1), l1_up)?;

        set.insert(OperatorKind::LaplacianHodge(2), l2_down.add(&l2_up)?)?;
        set.insert(OperatorKind::LaplacianDown(2), l2_down)?;
        set.insert(OperatorKind::LaplacianUp(2), l2_up)?;

        set.insert(OperatorKind::Adjacency(0), a0)?;
        set.insert(OperatorKind::Adjacency(1), a1)?;
        set.insert(OperatorKind::Adjacency(2), a2)?;

        debug!(
            nodes = self.n_nodes,
            edges = self.edges.len(),
            faces = self.faces.len(),
            "built operator set"
        );
        Ok(set)
    }
}

/// Unsigned 0/1 adjacency from the union of off-diagonal patterns.
///
/// Patterns are unioned before signs are dropped, so down and up entries of
/// opposite sign cannot cancel the way they do inside the Hodge Laplacian.
fn off_diagonal_pattern(ops: &[&SparseOperator]) -> Result<SparseOperator> {
    let n = ops.first().map_or(0, |op| op.nrows());
    let triplets = ops
        .iter()
        .flat_map(|op| op.entries())
        .filter(|&(i, j, _)| i != j)
        .map(|(i, j, v)| (i, j, v.abs()));
    Ok(SparseOperator::from_triplets(n, n, triplets)?.map_values(|_| 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn filled_triangle() -> CellComplex {
        CellComplex::simplicial(3, vec![(0, 1), (0, 2), (1, 2)], vec![(0, 1, 2)]).unwrap()
    }

    #[test]
    fn test_boundary_of_boundary_vanishes() {
        let c = CellComplex::simplicial(
            4,
            vec![(0, 1), (1, 2), (0, 2), (2, 3), (1, 3)],
            vec![(0, 1, 2), (1, 2, 3)],
        )
        .unwrap();
        let b1 = c.boundary_1().unwrap();
        let b2 = c.boundary_2().unwrap();
        assert!(b1.compose(&b2).unwrap().is_zero());
    }

    #[test]
    fn test_square_cell_boundary_vanishes() {
        let c = CellComplex::new(4, Vec::new(), vec![vec![0, 1, 2, 3]]).unwrap();
        assert_eq!(c.n_edges(), 4);
        let b1 = c.boundary_1().unwrap();
        let b2 = c.boundary_2().unwrap();
        assert!(b1.compose(&b2).unwrap().is_zero());
    }

    #[test]
    fn test_triangle_boundary_signs() {
        let c = filled_triangle();
        // edges sorted: (0,1), (0,2), (1,2)
        assert_eq!(c.boundary_2().unwrap().to_dense(), array![[1.0], [-1.0], [1.0]]);
    }

    #[test]
    fn test_graph_laplacian() {
        let c = CellComplex::simplicial(3, vec![(0, 1), (1, 2)], Vec::new()).unwrap();
        let ops = c.operator_set().unwrap();
        let l0 = ops.get(OperatorKind::LaplacianUp(0)).unwrap().to_dense();
        assert_eq!(l0, array![[1.0, -1.0, 0.0], [-1.0, 2.0, -1.0], [0.0, -1.0, 1.0]]);
        assert_eq!(ops.cell_counts(), &[3, 2, 0]);
    }

    #[test]
    fn test_edge_adjacency_survives_hodge_cancellation() {
        let ops = filled_triangle().operator_set().unwrap();
        let a1 = ops.get(OperatorKind::Adjacency(1)).unwrap();
        // every pair of triangle edges is adjacent
        assert_eq!(a1.nnz(), 6);
        assert!(a1.values().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_invalid_cells() {
        assert!(CellComplex::simplicial(2, vec![(0, 0)], Vec::new()).is_err());
        assert!(CellComplex::simplicial(2, vec![(0, 5)], Vec::new()).is_err());
        assert!(CellComplex::new(3, Vec::new(), vec![vec![0, 1]]).is_err());
    }

    #[test]
    fn test_repeated_face_vertex_set() {
        // same square, rotated and reversed: one face, four edges
        let c = CellComplex::new(4, Vec::new(), vec![vec![0, 1, 2, 3], vec![1, 0, 3, 2]]).unwrap();
        assert_eq!(c.n_faces(), 1);
        assert_eq!(c.edges(), &[(0, 1), (0, 3), (1, 2), (2, 3)]);

        // a different cycle on the same vertices would leak its diagonals
        let err = CellComplex::new(4, Vec::new(), vec![vec![0, 1, 2, 3], vec![0, 2, 1, 3]]);
        assert!(matches!(err, Err(ConvError::InvalidCell(_))));
    }
}

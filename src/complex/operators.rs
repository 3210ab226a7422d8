//! Operator Sets: Rank-Indexed Lookup of Structural Operators
//!
//! A layer never branches on "which rank am I"; it names the operators it
//! needs by `OperatorKind` and the `OperatorSet` hands them out. The set also
//! owns the cell counts `n_r`, so every inserted operator is checked against
//! the invariant `rows == n_target`, `cols == n_source` once, up front.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::SparseOperator;
use crate::error::{ConvError, Result};

/// Name of a structural operator of a complex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "rank")]
pub enum OperatorKind {
    /// Signed incidence `B_r`: rank r → rank r-1
    Boundary(usize),
    /// Transposed incidence `B_rᵀ`: rank r-1 → rank r
    Coboundary(usize),
    /// Unsigned same-rank adjacency
    Adjacency(usize),
    /// `B_rᵀ B_r`
    LaplacianDown(usize),
    /// `B_{r+1} B_{r+1}ᵀ`
    LaplacianUp(usize),
    /// Down + up
    LaplacianHodge(usize),
}

impl OperatorKind {
    /// `(source rank, target rank)` of the map
    pub fn ranks(&self) -> Result<(usize, usize)> {
        match *self {
            OperatorKind::Boundary(0) | OperatorKind::Coboundary(0) => Err(ConvError::config(
                format!("{self} is undefined: rank 0 has no boundary"),
            )),
            OperatorKind::Boundary(r) => Ok((r, r - 1)),
            OperatorKind::Coboundary(r) => Ok((r - 1, r)),
            OperatorKind::Adjacency(r)
            | OperatorKind::LaplacianDown(r)
            | OperatorKind::LaplacianUp(r)
            | OperatorKind::LaplacianHodge(r) => Ok((r, r)),
        }
    }

    pub fn is_same_rank(&self) -> bool {
        matches!(self.ranks(), Ok((a, b)) if a == b)
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorKind::Boundary(r) => write!(f, "B_{r}"),
            OperatorKind::Coboundary(r) => write!(f, "B_{r}^T"),
            OperatorKind::Adjacency(r) => write!(f, "A_{r}"),
            OperatorKind::LaplacianDown(r) => write!(f, "L_{r}^down"),
            OperatorKind::LaplacianUp(r) => write!(f, "L_{r}^up"),
            OperatorKind::LaplacianHodge(r) => write!(f, "L_{r}"),
        }
    }
}

/// Dense table indexed by rank
///
/// Serialises as a `{rank: value}` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<usize, T>",
    into = "BTreeMap<usize, T>",
    bound(serialize = "T: Serialize + Clone", deserialize = "T: Deserialize<'de>")
)]
pub struct RankTable<T> {
    slots: Vec<Option<T>>,
}

impl<T> RankTable<T> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn insert(&mut self, rank: usize, value: T) -> Option<T> {
        if self.slots.len() <= rank {
            self.slots.resize_with(rank + 1, || None);
        }
        self.slots[rank].replace(value)
    }

    pub fn get(&self, rank: usize) -> Option<&T> {
        self.slots.get(rank).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, rank: usize) -> Option<&mut T> {
        self.slots.get_mut(rank).and_then(Option::as_mut)
    }

    pub fn contains(&self, rank: usize) -> bool {
        self.get(rank).is_some()
    }

    /// Populated `(rank, value)` pairs in ascending rank order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(r, v)| v.as_ref().map(|v| (r, v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(r, v)| v.as_mut().map(|v| (r, v)))
    }

    pub fn ranks(&self) -> Vec<usize> {
        self.iter().map(|(r, _)| r).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for RankTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntoIterator for RankTable<T> {
    type Item = (usize, T);
    type IntoIter = std::vec::IntoIter<(usize, T)>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots
            .into_iter()
            .enumerate()
            .filter_map(|(r, v)| v.map(|v| (r, v)))
            .collect::<Vec<_>>()
            .into_iter()
    }
}

impl<T> From<BTreeMap<usize, T>> for RankTable<T> {
    fn from(map: BTreeMap<usize, T>) -> Self {
        map.into_iter().collect()
    }
}

impl<T> From<RankTable<T>> for BTreeMap<usize, T> {
    fn from(table: RankTable<T>) -> Self {
        table.into_iter().collect()
    }
}

impl<T> FromIterator<(usize, T)> for RankTable<T> {
    fn from_iter<I: IntoIterator<Item = (usize, T)>>(iter: I) -> Self {
        let mut table = RankTable::new();
        for (r, v) in iter {
            table.insert(r, v);
        }
        table
    }
}

/// Immutable operator bundle for one complex instance
#[derive(Debug, Clone)]
pub struct OperatorSet {
    cell_counts: Vec<usize>,
    operators: HashMap<OperatorKind, SparseOperator>,
}

impl OperatorSet {
    /// Empty set for a complex with `cell_counts[r]` cells of rank r
    pub fn new(cell_counts: Vec<usize>) -> Self {
        Self {
            cell_counts,
            operators: HashMap::new(),
        }
    }

    /// Register an operator after checking it against the cell counts.
    ///
    /// Registering a boundary also registers its transpose as the coboundary.
    pub fn insert(&mut self, kind: OperatorKind, op: SparseOperator) -> Result<()> {
        let (source, target) = kind.ranks()?;
        let n_source = self.n_cells(source)?;
        let n_target = self.n_cells(target)?;
        if op.nrows() != n_target {
            return Err(ConvError::shape(format!("{kind} rows"), n_target, op.nrows()));
        }
        if op.ncols() != n_source {
            return Err(ConvError::shape(format!("{kind} columns"), n_source, op.ncols()));
        }
        match kind {
            OperatorKind::Boundary(r) => {
                self.operators.insert(OperatorKind::Coboundary(r), op.transpose());
            }
            OperatorKind::Coboundary(r) => {
                self.operators.insert(OperatorKind::Boundary(r), op.transpose());
            }
            _ => {}
        }
        self.operators.insert(kind, op);
        Ok(())
    }

    /// Builder-style `insert`
    pub fn with(mut self, kind: OperatorKind, op: SparseOperator) -> Result<Self> {
        self.insert(kind, op)?;
        Ok(self)
    }

    pub fn get(&self, kind: OperatorKind) -> Result<&SparseOperator> {
        self.operators
            .get(&kind)
            .ok_or_else(|| ConvError::UnknownOperator(kind.to_string()))
    }

    pub fn contains(&self, kind: OperatorKind) -> bool {
        self.operators.contains_key(&kind)
    }

    /// Cell count `n_r`
    pub fn n_cells(&self, rank: usize) -> Result<usize> {
        self.cell_counts.get(rank).copied().ok_or(ConvError::InvalidRank {
            rank,
            max_rank: self.max_rank(),
        })
    }

    pub fn cell_counts(&self) -> &[usize] {
        &self.cell_counts
    }

    /// Highest rank of the complex (0 for an empty count list)
    pub fn max_rank(&self) -> usize {
        self.cell_counts.len().saturating_sub(1)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &OperatorKind> {
        self.operators.keys()
    }

    /// Relabel the cells of `rank`: cell `i` becomes cell `perm[i]`.
    ///
    /// Every operator touching `rank` has the matching rows and/or columns
    /// permuted.
    pub fn relabeled(&self, rank: usize, perm: &[usize]) -> Result<OperatorSet> {
        let n = self.n_cells(rank)?;
        if perm.len() != n {
            return Err(ConvError::shape("cell permutation", n, perm.len()));
        }
        let mut seen = vec![false; n];
        for &p in perm {
            if p >= n || std::mem::replace(&mut seen[p], true) {
                return Err(ConvError::config("relabeling is not a permutation"));
            }
        }

        let mut out = OperatorSet::new(self.cell_counts.clone());
        for (&kind, op) in &self.operators {
            let (source, target) = kind.ranks()?;
            let rows: Vec<usize> = if target == rank {
                perm.to_vec()
            } else {
                (0..op.nrows()).collect()
            };
            let cols: Vec<usize> = if source == rank {
                perm.to_vec()
            } else {
                (0..op.ncols()).collect()
            };
            out.operators.insert(kind, op.permuted(&rows, &cols)?);
        }
        Ok(out)
    }
}

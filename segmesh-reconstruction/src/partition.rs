//! Segment partitioning
//!
//! Splits a labeled voxel grid into one scalar field per selected label.
//! Inside voxels of a label hold the negated voxel value and every other
//! voxel holds the sentinel `0.0`, so the zero isosurface wraps the label.
//!
//! The grid is scanned once to assign each voxel a slot; dense per-label
//! fields are only built on demand by [`SegmentPartition::field`].

use itertools::Itertools;
use segmesh_core::{label_of, Error, Result, VoxelGrid};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Label id reported for the single foreground surface
pub const FOREGROUND_LABEL: u32 = 0;

/// Field value of voxels that belong to no surface
pub const OUTSIDE_SENTINEL: f32 = 0.0;

/// Slot marker for voxels assigned to no label
const NO_SLOT: u32 = u32::MAX;

/// Which surfaces to extract from a grid
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LabelSelection {
    /// One surface around every voxel with a positive value
    #[default]
    Foreground,
    /// One surface per listed label id (ids must be >= 1)
    Labels(Vec<u32>),
    /// One surface per label present in the grid
    Present,
}

impl LabelSelection {
    /// Contiguous labels `1..=count`
    pub fn first_n(count: u32) -> Self {
        LabelSelection::Labels((1..=count).collect())
    }

    pub fn is_foreground(&self) -> bool {
        matches!(self, LabelSelection::Foreground)
    }
}

/// Dense scalar field for one label, laid out like its source grid
#[derive(Debug, Clone, PartialEq)]
pub struct LabelField {
    dimensions: [usize; 3],
    values: Vec<f32>,
}

impl LabelField {
    pub fn dimensions(&self) -> [usize; 3] {
        self.dimensions
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.dimensions[0] * (j + self.dimensions[1] * k)
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> Option<f32> {
        let [w, h, d] = self.dimensions;
        if i < w && j < h && k < d {
            Some(self.values[self.index(i, j, k)])
        } else {
            None
        }
    }

    /// Number of voxels inside the surface
    pub fn inside_count(&self) -> usize {
        self.values.iter().filter(|&&v| v < 0.0).count()
    }

    /// True when no voxel is inside
    pub fn is_empty(&self) -> bool {
        !self.values.iter().any(|&v| v < 0.0)
    }
}

/// Single-pass label assignment for a grid
#[derive(Debug, Clone)]
pub struct SegmentPartition<'a> {
    grid: &'a VoxelGrid,
    labels: Vec<u32>,
    slots: Vec<u32>,
    counts: Vec<usize>,
}

impl<'a> SegmentPartition<'a> {
    /// Selected label ids, ascending (`[FOREGROUND_LABEL]` in foreground mode)
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    pub fn label(&self, slot: usize) -> Option<u32> {
        self.labels.get(slot).copied()
    }

    /// Voxels assigned to `slot`
    pub fn voxel_count(&self, slot: usize) -> usize {
        self.counts.get(slot).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn grid(&self) -> &'a VoxelGrid {
        self.grid
    }

    /// Materialize the dense field of one slot
    pub fn field(&self, slot: usize) -> Result<LabelField> {
        if slot >= self.labels.len() {
            return Err(Error::InvalidData(format!(
                "slot {} out of range for {} labels",
                slot,
                self.labels.len()
            )));
        }

        let slot = slot as u32;
        let values = self
            .grid
            .values()
            .iter()
            .zip(&self.slots)
            .map(|(&p, &s)| if s == slot { -p } else { OUTSIDE_SENTINEL })
            .collect();

        Ok(LabelField {
            dimensions: self.grid.dimensions(),
            values,
        })
    }
}

/// Assign every voxel of `grid` to at most one selected label.
///
/// In foreground mode a voxel is inside when its value is finite and
/// positive. Otherwise a voxel belongs to label `L` when its value is
/// exactly `L` and `L` is selected. Fractional and unselected values are
/// dropped from every field.
pub fn partition<'a>(
    grid: &'a VoxelGrid,
    selection: &LabelSelection,
) -> Result<SegmentPartition<'a>> {
    let labels = match selection {
        LabelSelection::Foreground => vec![FOREGROUND_LABEL],
        LabelSelection::Labels(ids) => {
            if ids.contains(&0) {
                return Err(Error::InvalidData(
                    "label 0 is background and cannot be selected".to_string(),
                ));
            }
            ids.iter().copied().sorted_unstable().dedup().collect()
        }
        LabelSelection::Present => grid.distinct_labels(),
    };

    let mut counts = vec![0usize; labels.len()];
    let slots: Vec<u32> = if selection.is_foreground() {
        grid.values()
            .iter()
            .map(|&p| {
                if p.is_finite() && p > 0.0 {
                    counts[0] += 1;
                    0
                } else {
                    NO_SLOT
                }
            })
            .collect()
    } else {
        grid.values()
            .iter()
            .map(|&p| {
                label_of(p)
                    .and_then(|label| labels.binary_search(&label).ok())
                    .map(|slot| {
                        counts[slot] += 1;
                        slot as u32
                    })
                    .unwrap_or(NO_SLOT)
            })
            .collect()
    };

    debug!(
        "Partitioned {} voxels into {} labels ({} assigned)",
        grid.voxel_count(),
        labels.len(),
        counts.iter().sum::<usize>()
    );

    Ok(SegmentPartition {
        grid,
        labels,
        slots,
        counts,
    })
}

//! Which rows of a voltage matrix to scan and where they sit on the fiber.

use crate::error::{RasterError, Result};
use crate::record::{RecordingMode, SimulationRecord};

/// Rows to scan and the coordinate lookup for them.
///
/// `coordinates` is indexed by row number, not by position in `rows`: for a
/// myelinated fiber recorded everywhere, `rows` holds the node-of-Ranvier
/// indices into the full segment coordinate array `x`.
#[derive(Debug, Clone, Copy)]
pub struct ScanGeometry<'a> {
    pub rows: ScanRows<'a>,
    pub coordinates: &'a [f64],
}

/// Row indices to scan.
#[derive(Debug, Clone, Copy)]
pub enum ScanRows<'a> {
    /// Explicit row list (node-of-Ranvier indices).
    Nodes(&'a [u32]),
    /// Every row `0..n`.
    All(usize),
}

impl ScanRows<'_> {
    pub fn len(&self) -> usize {
        match self {
            ScanRows::Nodes(nodes) => nodes.len(),
            ScanRows::All(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, k: usize) -> usize {
        match self {
            ScanRows::Nodes(nodes) => nodes[k] as usize,
            ScanRows::All(_) => k,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).map(move |k| self.get(k))
    }

    /// Row indices as an owned list, in scan order.
    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }
}

impl<'a> ScanGeometry<'a> {
    /// Resolves the scan geometry of a record.
    ///
    /// Myelinated fibers recorded everywhere are scanned at their nodes of
    /// Ranvier with the segment coordinates `x`; every other record is
    /// scanned on each recorded position with `x_rec`.
    ///
    /// # Errors
    /// `MissingField` when the array required by the record's mode is absent.
    pub fn resolve(record: &'a SimulationRecord) -> Result<Self> {
        if record.myelinated && record.rec == RecordingMode::All {
            let nodes = record
                .node_index
                .as_deref()
                .ok_or(RasterError::MissingField("node_index"))?;
            let x = record.x.as_deref().ok_or(RasterError::MissingField("x"))?;
            Ok(Self {
                rows: ScanRows::Nodes(nodes),
                coordinates: x,
            })
        } else {
            let x_rec = record
                .x_rec
                .as_deref()
                .ok_or(RasterError::MissingField("x_rec"))?;
            Ok(Self {
                rows: ScanRows::All(x_rec.len()),
                coordinates: x_rec,
            })
        }
    }

    /// Checks every scanned row against the matrix height and coordinate array.
    pub fn check_bounds(&self, n_rows: usize) -> Result<()> {
        for row in self.rows.iter() {
            if row >= n_rows {
                return Err(RasterError::IndexOutOfRange {
                    what: "row",
                    index: row,
                    len: n_rows,
                });
            }
            if row >= self.coordinates.len() {
                return Err(RasterError::IndexOutOfRange {
                    what: "coordinate",
                    index: row,
                    len: self.coordinates.len(),
                });
            }
        }
        Ok(())
    }
}

/// Distance between the point `(x, y)` and the line `y = a*x + b`.
pub fn distance_point_to_line(x: f64, y: f64, a: f64, b: f64) -> f64 {
    libm::fabs(a * x - y + b) / libm::sqrt(a * a + 1.0)
}

use crate::store::{Coordinate, LineId, PipelineLine};

use super::geometry::distance;

/// Result of looking for the route vertex nearest to a click.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection {
    Match {
        line_id: LineId,
        vertex_index: usize,
        /// The matched vertex, which becomes the burst location.
        location: Coordinate,
        distance_m: f64,
    },
    NotFound,
}

/// Snaps a reported leak to the nearest vertex of a line that is not already
/// bursting.
///
/// The search is a linear scan over every vertex of every eligible line,
/// O(lines × points). Routes are drawn by hand, so vertex counts stay small.
#[derive(Debug, Clone, Copy)]
pub struct BurstDetector {
    threshold_m: f64,
}

impl BurstDetector {
    pub fn new(threshold_m: f64) -> Self {
        Self { threshold_m }
    }

    pub fn threshold_m(&self) -> f64 {
        self.threshold_m
    }

    /// Finds the nearest vertex within the threshold. Lines are scanned in the
    /// order given and vertices in route order; the first minimum found wins.
    pub fn find_nearest<'a>(
        &self,
        click: Coordinate,
        lines: impl IntoIterator<Item = &'a PipelineLine>,
    ) -> Detection {
        let mut best: Option<(LineId, usize, Coordinate, f64)> = None;

        for line in lines.into_iter().filter(|l| !l.is_bursting()) {
            for (index, &vertex) in line.points().iter().enumerate() {
                let d = distance(click, vertex);
                if best.is_none_or(|(_, _, _, min)| d < min) {
                    best = Some((line.id(), index, vertex, d));
                }
            }
        }

        match best {
            Some((line_id, vertex_index, location, distance_m)) if distance_m <= self.threshold_m => {
                Detection::Match {
                    line_id,
                    vertex_index,
                    location,
                    distance_m,
                }
            }
            _ => Detection::NotFound,
        }
    }
}

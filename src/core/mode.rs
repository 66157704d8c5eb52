use std::fmt;

use crate::error::PipeBurstError;
use crate::store::{Coordinate, LineId};

const MIN_ROUTE_POINTS: usize = 2;

/// What a map click currently means.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Mode {
    #[default]
    Idle,
    /// Drawing a new route; `awaiting_name` once the route was finished and the
    /// naming step is open.
    Drawing {
        points: Vec<Coordinate>,
        awaiting_name: bool,
    },
    Editing {
        line_id: LineId,
        points: Vec<Coordinate>,
    },
    ReportingBurst,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Drawing { .. } => f.write_str("drawing"),
            Self::Editing { line_id, .. } => write!(f, "editing line {}", line_id),
            Self::ReportingBurst => f.write_str("reporting burst"),
        }
    }
}

/// The in-progress work dropped by a cancel.
#[derive(Debug, Clone, PartialEq)]
pub enum Abandoned {
    Nothing,
    Draft,
    Edit(LineId),
    BurstReport,
}

/// Owns the current [`Mode`] and its pending-points buffer.
#[derive(Debug, Clone, Default)]
pub struct ModeMachine {
    mode: Mode,
}

impl ModeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn is_idle(&self) -> bool {
        self.mode == Mode::Idle
    }

    /// Points of the route being drawn or edited.
    pub fn buffer(&self) -> &[Coordinate] {
        match &self.mode {
            Mode::Drawing { points, .. } | Mode::Editing { points, .. } => points,
            _ => &[],
        }
    }

    /// True while uncommitted geometry exists.
    pub fn has_draft(&self) -> bool {
        matches!(self.mode, Mode::Drawing { .. } | Mode::Editing { .. })
    }

    /// Returns to `Idle`, reporting what was dropped.
    pub fn reset(&mut self) -> Abandoned {
        match std::mem::take(&mut self.mode) {
            Mode::Idle => Abandoned::Nothing,
            Mode::Drawing { .. } => Abandoned::Draft,
            Mode::Editing { line_id, .. } => Abandoned::Edit(line_id),
            Mode::ReportingBurst => Abandoned::BurstReport,
        }
    }

    pub fn start_drawing(&mut self) -> Abandoned {
        let abandoned = self.reset();
        self.mode = Mode::Drawing {
            points: Vec::new(),
            awaiting_name: false,
        };
        abandoned
    }

    /// Starts editing a copy of `points`. The caller checks the line may be edited.
    pub fn start_editing(&mut self, line_id: LineId, points: Vec<Coordinate>) -> Abandoned {
        let abandoned = self.reset();
        self.mode = Mode::Editing { line_id, points };
        abandoned
    }

    pub fn start_reporting(&mut self) -> Abandoned {
        let abandoned = self.reset();
        self.mode = Mode::ReportingBurst;
        abandoned
    }

    /// Appends a clicked point while drawing or editing. Returns false when the
    /// current mode does not collect points.
    pub fn push_point(&mut self, point: Coordinate) -> bool {
        match &mut self.mode {
            Mode::Drawing { points, .. } | Mode::Editing { points, .. } => {
                points.push(point);
                true
            }
            _ => false,
        }
    }

    /// Drag-moves an existing vertex of the edit buffer.
    pub fn move_point(&mut self, index: usize, to: Coordinate) -> Result<(), PipeBurstError> {
        let points = self.edit_buffer_mut()?;
        if index >= points.len() {
            return Err(out_of_range(index, points.len()));
        }
        points[index] = to;
        Ok(())
    }

    /// Deletes a vertex of the edit buffer, keeping at least two points.
    pub fn remove_point(&mut self, index: usize) -> Result<(), PipeBurstError> {
        let points = self.edit_buffer_mut()?;
        if index >= points.len() {
            return Err(out_of_range(index, points.len()));
        }
        if points.len() <= MIN_ROUTE_POINTS {
            return Err(PipeBurstError::Validation(format!(
                "a route keeps at least {} points",
                MIN_ROUTE_POINTS
            )));
        }
        points.remove(index);
        Ok(())
    }

    fn edit_buffer_mut(&mut self) -> Result<&mut Vec<Coordinate>, PipeBurstError> {
        match &mut self.mode {
            Mode::Editing { points, .. } => Ok(points),
            other => Err(PipeBurstError::Precondition(format!(
                "route points can only be adjusted while editing (currently {})",
                other
            ))),
        }
    }

    /// Marks the drawn route as finished and waiting for a name. Returns false,
    /// and cancels back to `Idle`, when it has fewer than two points.
    pub fn finish_drawing(&mut self) -> Result<bool, PipeBurstError> {
        match &mut self.mode {
            Mode::Drawing {
                points,
                awaiting_name,
            } if points.len() >= MIN_ROUTE_POINTS => {
                *awaiting_name = true;
                Ok(true)
            }
            Mode::Drawing { .. } => {
                self.reset();
                Ok(false)
            }
            other => Err(PipeBurstError::Precondition(format!(
                "no line is being drawn (currently {})",
                other
            ))),
        }
    }

    /// Hands over the drawn route and returns to `Idle`.
    pub fn take_drawing(&mut self) -> Option<Vec<Coordinate>> {
        match std::mem::take(&mut self.mode) {
            Mode::Drawing { points, .. } => Some(points),
            other => {
                self.mode = other;
                None
            }
        }
    }

    /// Hands over the edited route and returns to `Idle`.
    pub fn take_edit(&mut self) -> Option<(LineId, Vec<Coordinate>)> {
        match std::mem::take(&mut self.mode) {
            Mode::Editing { line_id, points } => Some((line_id, points)),
            other => {
                self.mode = other;
                None
            }
        }
    }
}

fn out_of_range(index: usize, len: usize) -> PipeBurstError {
    PipeBurstError::Validation(format!("point {} does not exist ({} points)", index, len))
}

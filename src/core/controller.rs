use std::fmt;

use tracing::debug;

use crate::config::AppConfig;
use crate::error::PipeBurstError;
use crate::store::{BurstEvent, Coordinate, LineId, LineStore, NewLine, PipeCategory};

use super::detector::{BurstDetector, Detection};
use super::geometry::{Bounds, bounds};
use super::mode::{Abandoned, Mode, ModeMachine};

pub type ConfirmationToken = u64;

/// A user action, as produced by buttons, map clicks and drags.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    StartNewLine,
    Click(Coordinate),
    /// Double-click or the finish button while drawing.
    Finish,
    FinishLine {
        name: String,
        category: PipeCategory,
        nominal_pressure: Option<f64>,
    },
    /// Adds a complete route without drawing it, e.g. from a GeoJSON file.
    ImportLine(NewLine),
    Cancel,
    StartEdit(LineId),
    MovePoint {
        index: usize,
        to: Coordinate,
    },
    RemovePoint(usize),
    SaveEdit,
    StartBurstReport,
    Repair(LineId),
    Delete(LineId),
    ToggleSystemPower,
    ResetAllData,
    ZoomToLine(LineId),
    Confirm(ConfirmationToken),
    Decline(ConfirmationToken),
}

/// A state change that waits for the user to affirm it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingAction {
    ReportBurst { line_id: LineId, event: BurstEvent },
    Repair(LineId),
    Delete(LineId),
    ResetAll,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingConfirmation {
    pub token: ConfirmationToken,
    pub action: PendingAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// A message for the status bar or a toast.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn from_error(err: &PipeBurstError) -> Self {
        if err.is_informational() {
            Self::info(err.to_string())
        } else {
            Self::error(err.to_string())
        }
    }
}

/// Work the host performs after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Render(LineId),
    RenderAll,
    Retract(LineId),
    RetractAll,
    DrawDraft {
        points: Vec<Coordinate>,
        vertex_markers: bool,
    },
    ClearDraft,
    Persist,
    ClearPersisted,
    Notify(Notice),
    PromptName,
    ConfirmationRequested {
        token: ConfirmationToken,
        prompt: String,
    },
    FitBounds(Bounds),
}

/// Application state plus the command transition function.
///
/// `handle` either applies a command and returns the effects the host must
/// carry out, or returns an error and leaves the state untouched.
#[derive(Debug)]
pub struct Controller {
    lines: LineStore,
    modes: ModeMachine,
    detector: BurstDetector,
    powered: bool,
    pending: Option<PendingConfirmation>,
    last_token: ConfirmationToken,
}

impl Controller {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            lines: LineStore::new().with_default_pressure(config.default_pressure),
            modes: ModeMachine::new(),
            detector: BurstDetector::new(config.detection_threshold_m),
            powered: false,
            pending: None,
            last_token: 0,
        }
    }

    pub fn lines(&self) -> &LineStore {
        &self.lines
    }

    pub(crate) fn lines_mut(&mut self) -> &mut LineStore {
        &mut self.lines
    }

    pub fn mode(&self) -> &Mode {
        self.modes.mode()
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn pending(&self) -> Option<&PendingConfirmation> {
        self.pending.as_ref()
    }

    pub fn detector(&self) -> &BurstDetector {
        &self.detector
    }

    pub fn handle(&mut self, command: Command) -> Result<Vec<Effect>, PipeBurstError> {
        debug!(?command, mode = %self.modes.mode(), "handling command");
        match command {
            Command::StartNewLine => {
                let mut effects = abandon_effects(self.modes.start_drawing());
                effects.push(Effect::Notify(Notice::info(
                    "Click on the map to draw, then finish to save the line",
                )));
                Ok(effects)
            }
            Command::Click(at) => Ok(self.click(at)),
            Command::Finish => self.finish(),
            Command::FinishLine {
                name,
                category,
                nominal_pressure,
            } => self.finish_line(name, category, nominal_pressure),
            Command::ImportLine(new_line) => {
                let name = new_line.name.trim().to_string();
                let id = self.lines.add(new_line)?;
                Ok(vec![
                    Effect::Render(id),
                    Effect::Persist,
                    Effect::Notify(Notice::info(format!("Line '{}' imported", name))),
                ])
            }
            Command::Cancel => Ok(abandon_effects(self.modes.reset())),
            Command::StartEdit(id) => self.start_edit(id),
            Command::MovePoint { index, to } => {
                self.modes.move_point(index, to)?;
                Ok(vec![self.edit_draft()])
            }
            Command::RemovePoint(index) => {
                self.modes.remove_point(index)?;
                Ok(vec![self.edit_draft()])
            }
            Command::SaveEdit => self.save_edit(),
            Command::StartBurstReport => {
                let mut effects = abandon_effects(self.modes.start_reporting());
                effects.push(Effect::Notify(Notice::warning(
                    "Burst mode: click exactly where the pipe broke",
                )));
                Ok(effects)
            }
            Command::Repair(id) => {
                let line = self.lines.find_by_id(id).ok_or_else(|| unknown_line(id))?;
                if !line.is_bursting() {
                    return Err(PipeBurstError::Precondition(format!(
                        "line '{}' has no burst to repair",
                        line.name()
                    )));
                }
                let prompt = format!(
                    "Has the repair on '{}' been completed? Flow will return to normal.",
                    line.name()
                );
                Ok(self.request(PendingAction::Repair(id), prompt))
            }
            Command::Delete(id) => {
                let line = self.lines.find_by_id(id).ok_or_else(|| unknown_line(id))?;
                let prompt = format!("Delete line '{}'?", line.name());
                Ok(self.request(PendingAction::Delete(id), prompt))
            }
            Command::ResetAllData => Ok(self.request(
                PendingAction::ResetAll,
                "Reset everything? All lines will be erased.".to_string(),
            )),
            Command::ToggleSystemPower => {
                self.powered = !self.powered;
                let message = if self.powered {
                    "System powered: flow simulation running"
                } else {
                    "System stopped"
                };
                Ok(vec![Effect::RenderAll, Effect::Notify(Notice::info(message))])
            }
            Command::ZoomToLine(id) => {
                let line = self.lines.find_by_id(id).ok_or_else(|| unknown_line(id))?;
                let extent = bounds(line.points()).ok_or_else(|| {
                    PipeBurstError::Geometry(format!("line '{}' has no extent", line.name()))
                })?;
                Ok(vec![Effect::FitBounds(extent)])
            }
            Command::Confirm(token) => self.confirm(token),
            Command::Decline(token) => {
                let pending = self.take_pending(token)?;
                debug!(action = ?pending.action, "confirmation declined");
                Ok(vec![Effect::Notify(Notice::info("Cancelled"))])
            }
        }
    }

    fn click(&mut self, at: Coordinate) -> Vec<Effect> {
        match self.modes.mode() {
            Mode::Drawing { .. } => {
                self.modes.push_point(at);
                vec![Effect::DrawDraft {
                    points: self.modes.buffer().to_vec(),
                    vertex_markers: false,
                }]
            }
            Mode::Editing { .. } => {
                self.modes.push_point(at);
                vec![self.edit_draft()]
            }
            Mode::ReportingBurst => {
                // One attempt per activation, matched or not
                self.modes.reset();
                match self.detector.find_nearest(at, self.lines.iter()) {
                    Detection::Match {
                        line_id,
                        vertex_index,
                        location,
                        distance_m,
                    } => {
                        let name = self
                            .lines
                            .find_by_id(line_id)
                            .map(|l| l.name().to_string())
                            .unwrap_or_default();
                        debug!(line_id, vertex_index, distance_m, "burst click matched");
                        let event = BurstEvent::new(location, vertex_index);
                        self.request(
                            PendingAction::ReportBurst { line_id, event },
                            format!("Report a burst on line '{}'?", name),
                        )
                    }
                    Detection::NotFound => {
                        let miss = PipeBurstError::DetectionMiss {
                            threshold_m: self.detector.threshold_m(),
                        };
                        vec![Effect::Notify(Notice::from_error(&miss))]
                    }
                }
            }
            Mode::Idle => Vec::new(),
        }
    }

    fn finish(&mut self) -> Result<Vec<Effect>, PipeBurstError> {
        if self.modes.finish_drawing()? {
            Ok(vec![Effect::PromptName])
        } else {
            Ok(discarded_draft())
        }
    }

    fn finish_line(
        &mut self,
        name: String,
        category: PipeCategory,
        nominal_pressure: Option<f64>,
    ) -> Result<Vec<Effect>, PipeBurstError> {
        if !matches!(self.modes.mode(), Mode::Drawing { .. }) {
            return Err(PipeBurstError::Precondition(format!(
                "no line is being drawn (currently {})",
                self.modes.mode()
            )));
        }
        if self.modes.buffer().len() < 2 {
            self.modes.reset();
            return Ok(discarded_draft());
        }

        let new_line = NewLine {
            name,
            category,
            nominal_pressure,
            points: self.modes.buffer().to_vec(),
        };
        let id = self.lines.add(new_line)?;
        self.modes.take_drawing();

        let name = self.lines.find_by_id(id).map(|l| l.name().to_string()).unwrap_or_default();
        Ok(vec![
            Effect::ClearDraft,
            Effect::Render(id),
            Effect::Persist,
            Effect::Notify(Notice::info(format!("Line '{}' saved", name))),
        ])
    }

    fn start_edit(&mut self, id: LineId) -> Result<Vec<Effect>, PipeBurstError> {
        let line = self.lines.find_by_id(id).ok_or_else(|| unknown_line(id))?;
        if line.is_bursting() {
            return Err(PipeBurstError::Precondition(format!(
                "line '{}' has an active burst; repair it before editing the route",
                line.name()
            )));
        }
        let points = line.points().to_vec();

        let mut effects = abandon_effects(self.modes.start_editing(id, points));
        effects.push(Effect::Retract(id));
        effects.push(self.edit_draft());
        effects.push(Effect::Notify(Notice::info(
            "Drag points to adjust, click the map to extend the route",
        )));
        Ok(effects)
    }

    fn save_edit(&mut self) -> Result<Vec<Effect>, PipeBurstError> {
        let Mode::Editing { line_id, points } = self.modes.mode() else {
            return Err(PipeBurstError::Precondition(format!(
                "no line is being edited (currently {})",
                self.modes.mode()
            )));
        };
        let line_id = *line_id;
        self.lines.replace_points(line_id, points.clone())?;
        self.modes.take_edit();

        let mut effects = vec![
            Effect::ClearDraft,
            Effect::Render(line_id),
            Effect::Persist,
            Effect::Notify(Notice::info("Route saved")),
        ];
        // A located burst refers to the old vertices
        let stale = self.pending.take_if(|p| {
            matches!(p.action, PendingAction::ReportBurst { line_id: l, .. } if l == line_id)
        });
        if let Some(stale) = stale {
            debug!(token = stale.token, "burst report withdrawn after route change");
            effects.push(Effect::Notify(Notice::warning(
                "The pending burst report was withdrawn because the route changed",
            )));
        }
        Ok(effects)
    }

    fn edit_draft(&self) -> Effect {
        Effect::DrawDraft {
            points: self.modes.buffer().to_vec(),
            vertex_markers: true,
        }
    }

    /// Parks `action` behind a fresh token. Any in-progress draft is abandoned
    /// and an older pending confirmation is replaced.
    fn request(&mut self, action: PendingAction, prompt: String) -> Vec<Effect> {
        let mut effects = if self.modes.has_draft() {
            abandon_effects(self.modes.reset())
        } else {
            Vec::new()
        };

        self.last_token += 1;
        let token = self.last_token;
        if let Some(replaced) = self.pending.replace(PendingConfirmation { token, action }) {
            debug!(token = replaced.token, "pending confirmation replaced");
        }
        effects.push(Effect::ConfirmationRequested { token, prompt });
        effects
    }

    fn take_pending(
        &mut self,
        token: ConfirmationToken,
    ) -> Result<PendingConfirmation, PipeBurstError> {
        self.pending
            .take_if(|p| p.token == token)
            .ok_or_else(|| no_pending(token))
    }

    /// Runs the pending action. It stays pending when it fails.
    fn confirm(&mut self, token: ConfirmationToken) -> Result<Vec<Effect>, PipeBurstError> {
        let pending = self
            .pending
            .filter(|p| p.token == token)
            .ok_or_else(|| no_pending(token))?;
        let effects = self.run(pending.action)?;
        self.pending = None;
        Ok(effects)
    }

    fn run(&mut self, action: PendingAction) -> Result<Vec<Effect>, PipeBurstError> {
        match action {
            PendingAction::ReportBurst { line_id, event } => {
                self.lines.set_burst(line_id, event)?;
                let name = self.line_name(line_id);
                Ok(vec![
                    Effect::Render(line_id),
                    Effect::Persist,
                    Effect::Notify(Notice::warning(format!(
                        "Burst reported on line '{}' at point {}",
                        name, event.vertex_index
                    ))),
                ])
            }
            PendingAction::Repair(id) => {
                self.lines.clear_burst(id)?;
                let name = self.line_name(id);
                Ok(vec![
                    Effect::Render(id),
                    Effect::Persist,
                    Effect::Notify(Notice::info(format!("Line '{}' repaired", name))),
                ])
            }
            PendingAction::Delete(id) => {
                let removed = self.lines.remove(id)?;
                Ok(vec![
                    Effect::Retract(id),
                    Effect::Persist,
                    Effect::Notify(Notice::info(format!("Line '{}' deleted", removed.name()))),
                ])
            }
            PendingAction::ResetAll => {
                self.lines.clear();
                self.modes.reset();
                Ok(vec![
                    Effect::ClearDraft,
                    Effect::RetractAll,
                    Effect::ClearPersisted,
                    Effect::Notify(Notice::info("All data erased")),
                ])
            }
        }
    }

    fn line_name(&self, id: LineId) -> String {
        self.lines
            .find_by_id(id)
            .map(|l| l.name().to_string())
            .unwrap_or_default()
    }
}

fn unknown_line(id: LineId) -> PipeBurstError {
    PipeBurstError::NotFound(format!("no pipeline line with id {}", id))
}

fn no_pending(token: ConfirmationToken) -> PipeBurstError {
    PipeBurstError::NotFound(format!("no pending confirmation with token {}", token))
}

/// Effects that undo the on-map trace of abandoned work.
fn abandon_effects(abandoned: Abandoned) -> Vec<Effect> {
    match abandoned {
        Abandoned::Nothing | Abandoned::BurstReport => Vec::new(),
        Abandoned::Draft => vec![Effect::ClearDraft],
        // The original route comes back unchanged
        Abandoned::Edit(id) => vec![Effect::ClearDraft, Effect::Render(id)],
    }
}

fn discarded_draft() -> Vec<Effect> {
    vec![
        Effect::ClearDraft,
        Effect::Notify(Notice::info(
            "Line discarded: at least two points are needed",
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng)
    }

    fn controller() -> Controller {
        Controller::new(&AppConfig::default().with_detection_threshold(50.0))
    }

    fn draw_line(ctl: &mut Controller, name: &str, points: &[Coordinate]) -> LineId {
        ctl.handle(Command::StartNewLine).unwrap();
        for &p in points {
            ctl.handle(Command::Click(p)).unwrap();
        }
        assert_eq!(ctl.handle(Command::Finish).unwrap(), vec![Effect::PromptName]);
        let effects = ctl
            .handle(Command::FinishLine {
                name: name.to_string(),
                category: PipeCategory::ProcessFluid,
                nominal_pressure: None,
            })
            .unwrap();
        match effects[1] {
            Effect::Render(id) => id,
            ref other => panic!("Expected render, got {:?}", other),
        }
    }

    fn token_of(effects: &[Effect]) -> ConfirmationToken {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::ConfirmationRequested { token, .. } => Some(*token),
                _ => None,
            })
            .expect("confirmation requested")
    }

    fn route() -> Vec<Coordinate> {
        vec![c(0.0, 0.0), c(0.0, 1.0), c(0.0, 2.0)]
    }

    fn report_burst(ctl: &mut Controller, at: Coordinate) -> Vec<Effect> {
        ctl.handle(Command::StartBurstReport).unwrap();
        ctl.handle(Command::Click(at)).unwrap()
    }

    #[test]
    fn test_draw_and_name_line() {
        let mut ctl = controller();
        let id = draw_line(&mut ctl, "A", &route());

        assert!(ctl.mode() == &Mode::Idle);
        let line = ctl.lines().find_by_id(id).unwrap();
        assert_eq!(line.name(), "A");
        assert_eq!(line.points().len(), 3);
        assert_eq!(line.nominal_pressure(), 4.0);
    }

    #[test]
    fn test_empty_name_keeps_drawing() {
        let mut ctl = controller();
        ctl.handle(Command::StartNewLine).unwrap();
        ctl.handle(Command::Click(c(0.0, 0.0))).unwrap();
        ctl.handle(Command::Click(c(0.0, 1.0))).unwrap();

        let result = ctl.handle(Command::FinishLine {
            name: String::new(),
            category: PipeCategory::Byproduct,
            nominal_pressure: None,
        });

        assert!(matches!(result, Err(PipeBurstError::Validation(_))));
        assert_eq!(ctl.lines().len(), 0);
        assert_eq!(ctl.modes.buffer().len(), 2);
    }

    #[test]
    fn test_finish_with_one_point_discards() {
        let mut ctl = controller();
        ctl.handle(Command::StartNewLine).unwrap();
        ctl.handle(Command::Click(c(0.0, 0.0))).unwrap();

        let effects = ctl.handle(Command::Finish).unwrap();
        assert_eq!(effects[0], Effect::ClearDraft);
        assert_eq!(ctl.mode(), &Mode::Idle);
        assert!(ctl.lines().is_empty());
    }

    #[test]
    fn test_click_in_idle_is_ignored() {
        let mut ctl = controller();
        assert!(ctl.handle(Command::Click(c(0.0, 0.0))).unwrap().is_empty());
    }

    #[test]
    fn test_report_burst_requires_confirmation() {
        let mut ctl = controller();
        let a = draw_line(&mut ctl, "A", &route());

        let effects = report_burst(&mut ctl, c(0.0, 1.0001));
        assert_eq!(ctl.mode(), &Mode::Idle);
        assert!(ctl.lines().find_by_id(a).unwrap().burst().is_none());

        let token = token_of(&effects);
        assert_eq!(
            ctl.pending().unwrap().action,
            PendingAction::ReportBurst {
                line_id: a,
                event: BurstEvent::new(c(0.0, 1.0), 1),
            }
        );

        let effects = ctl.handle(Command::Confirm(token)).unwrap();
        assert_eq!(effects[0], Effect::Render(a));
        assert_eq!(effects[1], Effect::Persist);

        let burst = ctl.lines().find_by_id(a).unwrap().burst().copied().unwrap();
        assert_eq!(burst.vertex_index, 1);
        assert_eq!(burst.location, c(0.0, 1.0));
        assert!(ctl.pending().is_none());
    }

    #[test]
    fn test_declined_burst_changes_nothing() {
        let mut ctl = controller();
        let a = draw_line(&mut ctl, "A", &route());

        let token = token_of(&report_burst(&mut ctl, c(0.0, 1.0001)));
        ctl.handle(Command::Decline(token)).unwrap();

        assert!(ctl.lines().find_by_id(a).unwrap().burst().is_none());
        assert!(matches!(
            ctl.handle(Command::Confirm(token)),
            Err(PipeBurstError::NotFound(_))
        ));
    }

    #[test]
    fn test_route_change_withdraws_pending_burst() {
        let mut ctl = controller();
        let a = draw_line(&mut ctl, "A", &route());
        let token = token_of(&report_burst(&mut ctl, c(0.0, 1.0001)));

        ctl.handle(Command::StartEdit(a)).unwrap();
        ctl.handle(Command::MovePoint { index: 1, to: c(5.0, 5.0) }).unwrap();
        let effects = ctl.handle(Command::SaveEdit).unwrap();

        assert!(ctl.pending().is_none());
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::Notify(Notice { level: NoticeLevel::Warning, .. })
        )));
        assert!(matches!(
            ctl.handle(Command::Confirm(token)),
            Err(PipeBurstError::NotFound(_))
        ));
        let line = ctl.lines().find_by_id(a).unwrap();
        assert!(line.burst().is_none());
        assert_eq!(line.points()[1], c(5.0, 5.0));
    }

    #[test]
    fn test_saving_another_route_keeps_pending_burst() {
        let mut ctl = controller();
        let a = draw_line(&mut ctl, "A", &route());
        let b = draw_line(&mut ctl, "B", &[c(10.0, 0.0), c(10.0, 1.0)]);
        let token = token_of(&report_burst(&mut ctl, c(0.0, 1.0001)));

        ctl.handle(Command::StartEdit(b)).unwrap();
        ctl.handle(Command::Click(c(10.0, 2.0))).unwrap();
        ctl.handle(Command::SaveEdit).unwrap();

        ctl.handle(Command::Confirm(token)).unwrap();
        assert_eq!(ctl.lines().find_by_id(a).unwrap().burst().unwrap().vertex_index, 1);
    }

    #[test]
    fn test_failed_confirmation_stays_pending() {
        let mut ctl = controller();
        let a = draw_line(&mut ctl, "A", &route());
        let token = token_of(&report_burst(&mut ctl, c(0.0, 1.0001)));
        ctl.lines_mut().remove(a).unwrap();

        assert!(matches!(
            ctl.handle(Command::Confirm(token)),
            Err(PipeBurstError::NotFound(_))
        ));
        assert_eq!(ctl.pending().map(|p| p.token), Some(token));

        ctl.handle(Command::Decline(token)).unwrap();
        assert!(ctl.pending().is_none());
    }

    #[test]
    fn test_burst_click_with_no_lines_is_detection_miss() {
        let mut ctl = controller();
        let effects = report_burst(&mut ctl, c(0.0, 0.0));

        assert_eq!(ctl.mode(), &Mode::Idle);
        assert!(ctl.pending().is_none());
        match &effects[..] {
            [Effect::Notify(notice)] => {
                assert_eq!(notice.level, NoticeLevel::Info);
                assert!(notice.message.contains("No pipeline detected"));
            }
            other => panic!("Expected one notice, got {:?}", other),
        }
    }

    #[test]
    fn test_edit_refused_while_bursting() {
        let mut ctl = controller();
        let a = draw_line(&mut ctl, "A", &route());
        let token = token_of(&report_burst(&mut ctl, c(0.0, 1.0001)));
        ctl.handle(Command::Confirm(token)).unwrap();

        let result = ctl.handle(Command::StartEdit(a));
        assert!(matches!(result, Err(PipeBurstError::Precondition(_))));
        assert_eq!(ctl.mode(), &Mode::Idle);
        assert_eq!(ctl.lines().find_by_id(a).unwrap().points(), route().as_slice());
    }

    #[test]
    fn test_edit_and_save() {
        let mut ctl = controller();
        let a = draw_line(&mut ctl, "A", &route());

        let effects = ctl.handle(Command::StartEdit(a)).unwrap();
        assert!(effects.contains(&Effect::Retract(a)));

        ctl.handle(Command::MovePoint { index: 0, to: c(0.5, 0.0) }).unwrap();
        ctl.handle(Command::RemovePoint(1)).unwrap();
        ctl.handle(Command::Click(c(0.0, 3.0))).unwrap();
        ctl.handle(Command::SaveEdit).unwrap();

        assert_eq!(ctl.mode(), &Mode::Idle);
        assert_eq!(
            ctl.lines().find_by_id(a).unwrap().points(),
            &[c(0.5, 0.0), c(0.0, 2.0), c(0.0, 3.0)]
        );
    }

    #[test]
    fn test_cancel_edit_restores_line() {
        let mut ctl = controller();
        let a = draw_line(&mut ctl, "A", &route());

        ctl.handle(Command::StartEdit(a)).unwrap();
        ctl.handle(Command::Click(c(1.0, 1.0))).unwrap();
        let effects = ctl.handle(Command::Cancel).unwrap();

        assert_eq!(effects, vec![Effect::ClearDraft, Effect::Render(a)]);
        assert_eq!(ctl.lines().find_by_id(a).unwrap().points(), route().as_slice());
    }

    #[test]
    fn test_switching_tool_abandons_edit() {
        let mut ctl = controller();
        let a = draw_line(&mut ctl, "A", &route());

        ctl.handle(Command::StartEdit(a)).unwrap();
        ctl.handle(Command::Click(c(1.0, 1.0))).unwrap();
        let effects = ctl.handle(Command::StartBurstReport).unwrap();

        assert_eq!(&effects[..2], &[Effect::ClearDraft, Effect::Render(a)]);
        assert_eq!(ctl.mode(), &Mode::ReportingBurst);
        assert_eq!(ctl.lines().find_by_id(a).unwrap().points().len(), 3);
    }

    #[test]
    fn test_repair_and_delete_are_gated() {
        let mut ctl = controller();
        let a = draw_line(&mut ctl, "A", &route());

        assert!(matches!(
            ctl.handle(Command::Repair(a)),
            Err(PipeBurstError::Precondition(_))
        ));

        let token = token_of(&report_burst(&mut ctl, c(0.0, 2.0)));
        ctl.handle(Command::Confirm(token)).unwrap();

        let token = token_of(&ctl.handle(Command::Repair(a)).unwrap());
        assert!(ctl.lines().find_by_id(a).unwrap().is_bursting());
        ctl.handle(Command::Confirm(token)).unwrap();
        assert!(!ctl.lines().find_by_id(a).unwrap().is_bursting());

        let token = token_of(&ctl.handle(Command::Delete(a)).unwrap());
        assert_eq!(ctl.lines().len(), 1);
        let effects = ctl.handle(Command::Confirm(token)).unwrap();
        assert_eq!(effects[0], Effect::Retract(a));
        assert!(ctl.lines().is_empty());

        assert!(matches!(
            ctl.handle(Command::Delete(a)),
            Err(PipeBurstError::NotFound(_))
        ));
    }

    #[test]
    fn test_newer_request_replaces_pending() {
        let mut ctl = controller();
        let a = draw_line(&mut ctl, "A", &route());

        let first = token_of(&ctl.handle(Command::Delete(a)).unwrap());
        let second = token_of(&ctl.handle(Command::ResetAllData).unwrap());

        assert!(ctl.handle(Command::Confirm(first)).is_err());
        assert_eq!(ctl.lines().len(), 1);

        let effects = ctl.handle(Command::Confirm(second)).unwrap();
        assert!(effects.contains(&Effect::ClearPersisted));
        assert!(ctl.lines().is_empty());
    }

    #[test]
    fn test_toggle_power_rerenders() {
        let mut ctl = controller();
        assert!(!ctl.is_powered());
        let effects = ctl.handle(Command::ToggleSystemPower).unwrap();
        assert_eq!(effects[0], Effect::RenderAll);
        assert!(ctl.is_powered());
    }

    #[test]
    fn test_zoom_to_line() {
        let mut ctl = controller();
        let a = draw_line(&mut ctl, "A", &route());

        match &ctl.handle(Command::ZoomToLine(a)).unwrap()[..] {
            [Effect::FitBounds(b)] => {
                assert_eq!(b.west, 0.0);
                assert_eq!(b.east, 2.0);
            }
            other => panic!("Expected bounds, got {:?}", other),
        }
    }

    #[test]
    fn test_import_line() {
        let mut ctl = controller();
        let effects = ctl
            .handle(Command::ImportLine(
                NewLine::new("Imported", PipeCategory::Byproduct, route()).with_pressure(3.0),
            ))
            .unwrap();

        assert_eq!(ctl.lines().len(), 1);
        assert_eq!(effects[1], Effect::Persist);
    }
}

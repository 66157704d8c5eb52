use geojson::FeatureCollection;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::PipeBurstError;
use crate::store::{KeyValueStore, LineSummary};

use super::controller::{Command, ConfirmationToken, Controller, Effect, Notice, NoticeLevel};
use super::geometry::lines_to_feature_collection;
use super::render::{MapSurface, RenderAdapter};

/// Input the host must collect from the user before the flow can continue.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    /// Ask for the new line's name and category.
    Name,
    /// Ask yes or no, then send `Confirm(token)` or `Decline(token)`.
    Confirm {
        token: ConfirmationToken,
        message: String,
    },
}

/// What the host shows after a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub notices: Vec<Notice>,
    pub prompt: Option<Prompt>,
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        self.notices
            .iter()
            .all(|n| n.level != NoticeLevel::Error)
    }
}

/// Wires a [`Controller`] to persistence and a map surface, carrying out the
/// effects of every command.
pub struct Session<K, S> {
    controller: Controller,
    kv: K,
    renderer: RenderAdapter<S>,
    storage_key: String,
}

impl<K: KeyValueStore, S: MapSurface> Session<K, S> {
    /// Loads the persisted lines and draws them. Unreadable storage starts an
    /// empty session.
    pub fn open(config: &AppConfig, kv: K, surface: S) -> Result<Self, PipeBurstError> {
        config.validate()?;

        let mut session = Self {
            controller: Controller::new(config),
            kv,
            renderer: RenderAdapter::new(surface),
            storage_key: config.storage_key.clone(),
        };

        if let Err(e) = session
            .controller
            .lines_mut()
            .load(&session.kv, &session.storage_key)
        {
            warn!(error = %e, "could not read persisted lines, starting empty");
        }

        session
            .renderer
            .surface_mut()
            .set_view(config.map_center, config.initial_zoom);
        session.render_all();
        info!(lines = session.controller.lines().len(), "session opened");
        Ok(session)
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn surface(&self) -> &S {
        self.renderer.surface()
    }

    pub fn store(&self) -> &K {
        &self.kv
    }

    pub fn summaries(&self) -> Vec<LineSummary> {
        self.controller.lines().summaries()
    }

    pub fn export_geojson(&self) -> FeatureCollection {
        lines_to_feature_collection(self.controller.lines().iter())
    }

    /// Runs one command and applies its effects. Failures are reported as
    /// notices; nothing is retried.
    pub fn execute(&mut self, command: Command) -> Outcome {
        let mut outcome = Outcome::default();
        match self.controller.handle(command) {
            Ok(effects) => {
                for effect in effects {
                    self.apply(effect, &mut outcome);
                }
            }
            Err(e) => {
                warn!(error = %e, "command failed");
                outcome.notices.push(Notice::from_error(&e));
            }
        }
        outcome
    }

    fn apply(&mut self, effect: Effect, outcome: &mut Outcome) {
        let powered = self.controller.is_powered();
        match effect {
            Effect::Render(id) => match self.controller.lines().find_by_id(id) {
                Some(line) => self.renderer.render(line, powered),
                None => self.renderer.retract(id),
            },
            Effect::RenderAll => self.render_all(),
            Effect::Retract(id) => self.renderer.retract(id),
            Effect::RetractAll => self.renderer.retract_all(),
            Effect::DrawDraft {
                points,
                vertex_markers,
            } => self.renderer.draw_draft(&points, vertex_markers),
            Effect::ClearDraft => self.renderer.clear_draft(),
            Effect::Persist => {
                if let Err(e) = self
                    .controller
                    .lines()
                    .persist(&mut self.kv, &self.storage_key)
                {
                    warn!(error = %e, "persisting lines failed");
                    outcome
                        .notices
                        .push(Notice::warning(format!("Changes were not saved: {}", e)));
                }
            }
            Effect::ClearPersisted => {
                if let Err(e) = self.kv.remove(&self.storage_key) {
                    warn!(error = %e, "clearing stored lines failed");
                    outcome
                        .notices
                        .push(Notice::warning(format!("Stored data was not erased: {}", e)));
                }
            }
            Effect::Notify(notice) => outcome.notices.push(notice),
            Effect::PromptName => outcome.prompt = Some(Prompt::Name),
            Effect::ConfirmationRequested { token, prompt } => {
                outcome.prompt = Some(Prompt::Confirm {
                    token,
                    message: prompt,
                })
            }
            Effect::FitBounds(bounds) => self.renderer.fit_bounds(bounds),
        }
    }

    fn render_all(&mut self) {
        let powered = self.controller.is_powered();
        for line in self.controller.lines().iter() {
            self.renderer.render(line, powered);
        }
    }
}

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use crate::store::{Coordinate, LineId, PipelineLine};

use super::geometry::{Bounds, total_length};

pub type LayerHandle = u64;

const DEAD_COLOR: &str = "#333333";
const DRAFT_COLOR: &str = "#facc15";

#[derive(Debug, Clone, PartialEq)]
pub struct PathStyle {
    pub color: &'static str,
    pub weight: u8,
    pub dash: Option<&'static str>,
    pub opacity: f64,
    /// Animated flow along the path, shown while the system is powered.
    pub flowing: bool,
}

impl PathStyle {
    fn live(line: &PipelineLine, powered: bool) -> Self {
        Self {
            color: line.category().color(),
            weight: if powered { 6 } else { 5 },
            dash: None,
            opacity: 1.0,
            flowing: powered,
        }
    }

    fn dead() -> Self {
        Self {
            color: DEAD_COLOR,
            weight: 4,
            dash: Some("5, 10"),
            opacity: 0.5,
            flowing: false,
        }
    }

    fn draft() -> Self {
        Self {
            color: DRAFT_COLOR,
            weight: 4,
            dash: Some("10, 10"),
            opacity: 1.0,
            flowing: false,
        }
    }
}

/// Action offered from a layer's popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerAction {
    Edit(LineId),
    Repair(LineId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    BurstAlert,
    /// Draggable handle on vertex `index` of the route being edited.
    EditVertex { index: usize },
}

/// A drawing instruction for the map widget.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Path {
        points: Vec<Coordinate>,
        style: PathStyle,
        label: Option<String>,
        action: Option<LayerAction>,
    },
    Marker {
        location: Coordinate,
        kind: MarkerKind,
        label: Option<String>,
        action: Option<LayerAction>,
    },
}

/// The drawing side of the map widget.
pub trait MapSurface {
    /// Adds a primitive and returns the handle that removes it.
    fn add(&mut self, primitive: &Primitive) -> LayerHandle;

    fn remove(&mut self, handle: LayerHandle);

    fn fit_bounds(&mut self, bounds: Bounds);

    fn set_view(&mut self, center: Coordinate, zoom: u8);
}

/// Short text shown on a line: name, category and route length.
pub fn summary_label(line: &PipelineLine) -> String {
    format!(
        "{} · {} · {:.0} m",
        line.name(),
        line.category().as_str().to_uppercase(),
        total_length(line.points())
    )
}

/// Primitives that draw `line` in its current state.
///
/// A bursting line is split at the burst vertex into a live upstream path and a
/// dashed dead downstream path, both including the vertex, plus an alert marker
/// offering the repair. A part with fewer than two points is not drawn.
pub fn render_instructions(line: &PipelineLine, powered: bool) -> Vec<Primitive> {
    let points = line.points();

    let Some(burst) = line.burst() else {
        return vec![Primitive::Path {
            points: points.to_vec(),
            style: PathStyle::live(line, powered),
            label: Some(summary_label(line)),
            action: Some(LayerAction::Edit(line.id())),
        }];
    };

    let split = burst.vertex_index.min(points.len().saturating_sub(1));
    let upstream = &points[..=split];
    let downstream = &points[split..];

    let mut primitives = Vec::with_capacity(3);
    if upstream.len() >= 2 {
        primitives.push(Primitive::Path {
            points: upstream.to_vec(),
            style: PathStyle::live(line, powered),
            label: Some(summary_label(line)),
            action: None,
        });
    }
    if downstream.len() >= 2 {
        primitives.push(Primitive::Path {
            points: downstream.to_vec(),
            style: PathStyle::dead(),
            label: None,
            action: None,
        });
    }
    primitives.push(Primitive::Marker {
        location: burst.location,
        kind: MarkerKind::BurstAlert,
        label: Some(format!("CRITICAL LEAK\n{}", line.name())),
        action: Some(LayerAction::Repair(line.id())),
    });
    primitives
}

/// Draws lines onto a [`MapSurface`], tracking the layers of each line so a
/// redraw always removes what was drawn before.
#[derive(Debug)]
pub struct RenderAdapter<S> {
    surface: S,
    layers: HashMap<LineId, Vec<LayerHandle>>,
    draft: Vec<LayerHandle>,
}

impl<S: MapSurface> RenderAdapter<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            layers: HashMap::new(),
            draft: Vec::new(),
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn render(&mut self, line: &PipelineLine, powered: bool) {
        self.retract(line.id());
        let handles: Vec<LayerHandle> = render_instructions(line, powered)
            .iter()
            .map(|p| self.surface.add(p))
            .collect();
        trace!(id = line.id(), layers = handles.len(), "line rendered");
        self.layers.insert(line.id(), handles);
    }

    pub fn retract(&mut self, id: LineId) {
        if let Some(handles) = self.layers.remove(&id) {
            for handle in handles {
                self.surface.remove(handle);
            }
        }
    }

    pub fn retract_all(&mut self) {
        for (_, handles) in self.layers.drain() {
            for handle in handles {
                self.surface.remove(handle);
            }
        }
    }

    /// Draws the route being drawn or edited, replacing the previous draft.
    pub fn draw_draft(&mut self, points: &[Coordinate], vertex_markers: bool) {
        self.clear_draft();
        if !points.is_empty() {
            let path = Primitive::Path {
                points: points.to_vec(),
                style: PathStyle::draft(),
                label: None,
                action: None,
            };
            self.draft.push(self.surface.add(&path));
        }
        if vertex_markers {
            for (index, &location) in points.iter().enumerate() {
                let marker = Primitive::Marker {
                    location,
                    kind: MarkerKind::EditVertex { index },
                    label: None,
                    action: None,
                };
                self.draft.push(self.surface.add(&marker));
            }
        }
    }

    pub fn clear_draft(&mut self) {
        for handle in self.draft.drain(..) {
            self.surface.remove(handle);
        }
    }

    pub fn fit_bounds(&mut self, bounds: Bounds) {
        self.surface.fit_bounds(bounds);
    }
}

/// A [`MapSurface`] that keeps the live primitives in memory.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    next_handle: LayerHandle,
    live: BTreeMap<LayerHandle, Primitive>,
    viewport: Option<Bounds>,
    view: Option<(Coordinate, u8)>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Live primitives in the order they were added.
    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.live.values()
    }

    pub fn viewport(&self) -> Option<Bounds> {
        self.viewport
    }

    pub fn view(&self) -> Option<(Coordinate, u8)> {
        self.view
    }
}

impl MapSurface for RecordingSurface {
    fn add(&mut self, primitive: &Primitive) -> LayerHandle {
        self.next_handle += 1;
        self.live.insert(self.next_handle, primitive.clone());
        self.next_handle
    }

    fn remove(&mut self, handle: LayerHandle) {
        self.live.remove(&handle);
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.viewport = Some(bounds);
    }

    fn set_view(&mut self, center: Coordinate, zoom: u8) {
        self.view = Some((center, zoom));
    }
}

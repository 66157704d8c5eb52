use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::core::geometry::total_length;
use crate::error::PipeBurstError;

use super::traits::KeyValueStore;
use super::types::{
    BurstEvent, Coordinate, DEFAULT_NOMINAL_PRESSURE, LineId, LineSummary, NewLine, PipelineLine,
};

const MIN_ROUTE_POINTS: usize = 2;

/// In-memory pipeline collection, kept in creation order.
#[derive(Debug, Clone)]
pub struct LineStore {
    lines: Vec<PipelineLine>,
    last_id: LineId,
    default_pressure: f64,
}

impl Default for LineStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LineStore {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            last_id: 0,
            default_pressure: DEFAULT_NOMINAL_PRESSURE,
        }
    }

    /// Sets the pressure assigned to new lines that do not specify one.
    pub fn with_default_pressure(mut self, pressure: f64) -> Self {
        self.default_pressure = pressure;
        self
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PipelineLine> {
        self.lines.iter()
    }

    pub fn find_by_id(&self, id: LineId) -> Option<&PipelineLine> {
        self.lines.iter().find(|l| l.id == id)
    }

    fn find_mut(&mut self, id: LineId) -> Result<&mut PipelineLine, PipeBurstError> {
        self.lines
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| not_found(id))
    }

    /// Validates and appends a new line, returning its assigned id.
    pub fn add(&mut self, new_line: NewLine) -> Result<LineId, PipeBurstError> {
        let name = new_line.name.trim();
        if name.is_empty() {
            return Err(PipeBurstError::Validation("line name must not be empty".into()));
        }
        validate_route(&new_line.points)?;
        let nominal_pressure = new_line.nominal_pressure.unwrap_or(self.default_pressure);
        validate_pressure(nominal_pressure)?;

        let id = self.next_id();
        self.lines.push(PipelineLine {
            id,
            name: name.to_string(),
            category: new_line.category,
            nominal_pressure,
            points: new_line.points,
            burst: None,
        });
        info!(id, name, "pipeline line added");
        Ok(id)
    }

    /// Time-based id, strictly greater than any id handed out or loaded so far.
    fn next_id(&mut self) -> LineId {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as LineId)
            .unwrap_or(0);
        self.last_id = now_ms.max(self.last_id + 1);
        self.last_id
    }

    pub fn remove(&mut self, id: LineId) -> Result<PipelineLine, PipeBurstError> {
        let index = self
            .lines
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| not_found(id))?;
        let removed = self.lines.remove(index);
        info!(id, name = %removed.name, "pipeline line removed");
        Ok(removed)
    }

    /// Replaces a line's route. Refused while the line has a burst, since the
    /// burst's vertex index is tied to the current route.
    pub fn replace_points(
        &mut self,
        id: LineId,
        points: Vec<Coordinate>,
    ) -> Result<(), PipeBurstError> {
        validate_route(&points)?;
        let line = self.find_mut(id)?;
        if line.is_bursting() {
            return Err(PipeBurstError::Precondition(format!(
                "line '{}' has an active burst and cannot be edited",
                line.name
            )));
        }
        debug!(id, points = points.len(), "route replaced");
        line.points = points;
        Ok(())
    }

    pub fn set_burst(&mut self, id: LineId, event: BurstEvent) -> Result<(), PipeBurstError> {
        let line = self.find_mut(id)?;
        if line.is_bursting() {
            return Err(PipeBurstError::Precondition(format!(
                "line '{}' already has an active burst",
                line.name
            )));
        }
        if event.vertex_index >= line.points.len() {
            return Err(PipeBurstError::Validation(format!(
                "vertex index {} is outside line '{}' ({} points)",
                event.vertex_index,
                line.name,
                line.points.len()
            )));
        }
        if line.points[event.vertex_index] != event.location {
            return Err(PipeBurstError::Precondition(format!(
                "burst location is not on vertex {} of line '{}'",
                event.vertex_index, line.name
            )));
        }
        line.burst = Some(BurstEvent {
            active: true,
            ..event
        });
        warn!(id, vertex = event.vertex_index, "burst reported");
        Ok(())
    }

    pub fn clear_burst(&mut self, id: LineId) -> Result<BurstEvent, PipeBurstError> {
        let line = self.find_mut(id)?;
        let burst = line.burst.take().ok_or_else(|| {
            PipeBurstError::Precondition(format!("line '{}' has no burst to repair", line.name))
        })?;
        info!(id, "burst repaired");
        Ok(burst)
    }

    /// Drops every line. The id counter keeps running so ids stay unique.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn summaries(&self) -> Vec<LineSummary> {
        self.lines
            .iter()
            .map(|l| LineSummary {
                id: l.id,
                name: l.name.clone(),
                category: l.category,
                length_meters: total_length(&l.points),
                point_count: l.points.len(),
                nominal_pressure: l.nominal_pressure,
                bursting: l.is_bursting(),
            })
            .collect()
    }

    /// Writes the whole collection to `key` as a JSON array.
    pub fn persist<K: KeyValueStore + ?Sized>(
        &self,
        kv: &mut K,
        key: &str,
    ) -> Result<(), PipeBurstError> {
        let json = serde_json::to_string(&self.lines)?;
        kv.set(key, &json)?;
        debug!(key, lines = self.lines.len(), "lines persisted");
        Ok(())
    }

    /// Appends the lines persisted under `key` to this collection.
    ///
    /// Loading is additive: call [`LineStore::clear`] first when the in-memory
    /// collection must be replaced rather than extended. An absent key loads
    /// nothing. Malformed JSON is treated as empty. Individual lines that cannot
    /// be read, or that break the route or burst invariants, are skipped while
    /// the rest load. Returns the number of lines added.
    pub fn load<K: KeyValueStore + ?Sized>(
        &mut self,
        kv: &K,
        key: &str,
    ) -> Result<usize, PipeBurstError> {
        let Some(json) = kv.get(key)? else {
            return Ok(0);
        };

        let values: Vec<serde_json::Value> = match serde_json::from_str(&json) {
            Ok(values) => values,
            Err(e) => {
                warn!(key, error = %e, "persisted lines are malformed, ignoring them");
                return Ok(0);
            }
        };

        let mut seen: HashSet<LineId> = self.lines.iter().map(|l| l.id).collect();
        let mut loaded = 0;
        for (position, value) in values.into_iter().enumerate() {
            let record: PipelineLine = match serde_json::from_value(value) {
                Ok(record) => record,
                Err(e) => {
                    warn!(position, error = %e, "skipping unreadable persisted line");
                    continue;
                }
            };
            if let Err(reason) = check_record(&record, &seen) {
                warn!(id = record.id, %reason, "skipping persisted line");
                continue;
            }
            seen.insert(record.id);
            self.last_id = self.last_id.max(record.id);
            // Bursts always sit on their vertex
            let burst = record.burst.map(|b| BurstEvent {
                location: record.points[b.vertex_index],
                ..BurstEvent::new(b.location, b.vertex_index)
            });
            self.lines.push(PipelineLine { burst, ..record });
            loaded += 1;
        }
        info!(key, loaded, "lines loaded");
        Ok(loaded)
    }
}

fn not_found(id: LineId) -> PipeBurstError {
    PipeBurstError::NotFound(format!("no pipeline line with id {}", id))
}

fn validate_route(points: &[Coordinate]) -> Result<(), PipeBurstError> {
    if points.len() < MIN_ROUTE_POINTS {
        return Err(PipeBurstError::Validation(format!(
            "a line needs at least {} points, got {}",
            MIN_ROUTE_POINTS,
            points.len()
        )));
    }
    if let Some(bad) = points
        .iter()
        .find(|c| !(c.lat.is_finite() && c.lng.is_finite()) || c.lat.abs() > 90.0)
    {
        return Err(PipeBurstError::Validation(format!(
            "invalid coordinate ({}, {})",
            bad.lat, bad.lng
        )));
    }
    Ok(())
}

fn validate_pressure(pressure: f64) -> Result<(), PipeBurstError> {
    if pressure.is_finite() && pressure > 0.0 {
        Ok(())
    } else {
        Err(PipeBurstError::Validation(format!(
            "nominal pressure must be a positive number, got {}",
            pressure
        )))
    }
}

fn check_record(record: &PipelineLine, seen: &HashSet<LineId>) -> Result<(), String> {
    if seen.contains(&record.id) {
        return Err("duplicate id".into());
    }
    if record.name.trim().is_empty() {
        return Err("empty name".into());
    }
    validate_route(&record.points).map_err(|e| e.to_string())?;
    validate_pressure(record.nominal_pressure).map_err(|e| e.to_string())?;
    if let Some(burst) = &record.burst {
        if burst.vertex_index >= record.points.len() {
            return Err(format!("burst vertex {} out of range", burst.vertex_index));
        }
    }
    Ok(())
}

pub mod config;
pub mod core;
pub mod error;
pub mod store;

pub use config::AppConfig;
pub use core::{
    Bounds, BurstDetector, Command, CommandTable, ConfirmationToken, Controller, Detection,
    Effect, FromGeoJson, LayerAction, MapSurface, Mode, Notice, NoticeLevel, Outcome, Primitive,
    Prompt, RecordingSurface, RenderAdapter, Session, ToGeoJson, bounds, distance,
    lines_to_feature_collection, render_instructions, route_from_geojson_str, total_length,
};
pub use error::PipeBurstError;
pub use store::{
    BurstEvent, Coordinate, FileStore, KeyValueStore, LineId, LineStore, LineSummary,
    MemoryStore, NewLine, PipeCategory, PipelineLine,
};

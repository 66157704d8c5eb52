pub mod controller;
pub mod detector;
pub mod dispatch;
pub mod geometry;
pub mod mode;
pub mod render;
pub mod session;

pub use controller::{
    Command, ConfirmationToken, Controller, Effect, Notice, NoticeLevel, PendingAction,
    PendingConfirmation,
};
pub use detector::{BurstDetector, Detection};
pub use dispatch::CommandTable;
pub use geometry::{
    Bounds, FromGeoJson, ToGeoJson, bounds, distance, lines_to_feature_collection,
    route_from_geojson_str, total_length,
};
pub use mode::{Mode, ModeMachine};
pub use render::{
    LayerAction, LayerHandle, MapSurface, MarkerKind, PathStyle, Primitive, RecordingSurface,
    RenderAdapter, render_instructions, summary_label,
};
pub use session::{Outcome, Prompt, Session};

pub mod backend;
pub mod line_store;
pub mod traits;
pub mod types;

pub use backend::{FileStore, MemoryStore};
pub use line_store::LineStore;
pub use traits::KeyValueStore;
pub use types::{
    BurstEvent, Coordinate, DEFAULT_NOMINAL_PRESSURE, LineId, LineSummary, NewLine, PipeCategory,
    PipelineLine, to_line_string,
};

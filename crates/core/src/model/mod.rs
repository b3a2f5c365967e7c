mod document;
mod ids;
mod progress;
mod roadmap;
mod status;
mod technology;

pub use document::ExportDocument;
pub use ids::ItemId;
pub use progress::{ProgressEntry, ProgressMap};
pub use roadmap::{Item, Resource, Roadmap};
pub use status::{Status, StatusParseError};
pub use technology::{Technology, merge_all};

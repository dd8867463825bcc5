pub mod dataset;
pub mod loader;
pub mod split;

pub use dataset::{one_hot_to_label, Dataset, Example};
pub use loader::{load_dir, load_sources, LoadReport, LoadedData, SourceSummary};
pub use split::{stratified_split, Split};

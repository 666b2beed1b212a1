pub mod combined;
pub mod import;
pub mod merge;

pub use combined::CombinedStats;
pub use import::{ImportService, ImportStats};
pub use merge::Disposition;

//! Census data: metadata, loading, cleaning, splitting and exploration

pub mod cleaning;
pub mod explore;
pub mod frame;
pub mod loader;
pub mod names;
pub mod split;

pub use cleaning::{to_identifier, Cleaner, CleaningError, CleaningReport};
pub use explore::{Exploration, LevelBreakdown, NumericBreakdown};
pub use frame::{Column, ColumnData, Frame, FrameError};
pub use loader::DataLoader;
pub use names::{AttributeKind, NamesError, NamesFile};
pub use split::{class_proportions, SplitError, StratifiedSplit};

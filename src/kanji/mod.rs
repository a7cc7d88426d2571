pub mod browse;
pub mod core;
pub mod selector;

// Re-export the main types for convenience
pub use self::browse::{search, Browser};
pub use self::core::{Catalog, CatalogError, KanjiEntry, Level, Mode};
pub use self::selector::{KanjiSelector, QueueSelector, RandomSelector, SelectionStrategy};

//! Persistent storage: the disposable, rebuildable index half of the
//! mirror/index split (spec §6 "Persisted state layout").

pub mod sqlite;
#[cfg(feature = "embeddings")]
pub mod sqlite_vec;
pub mod traits;

pub use sqlite::SqliteStore;
#[cfg(feature = "embeddings")]
pub use sqlite_vec::SqliteVecIndex;
pub use traits::{IndexStore, MoleculeFilter, VectorIndex};

pub mod error;
pub mod memory;
pub mod registry;
pub mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use registry::StaticRegistry;
pub use traits::{
    AccessLevel, BackendRegistry, ContentStore, EntryStore, ExternalEntry, TaskStore,
};

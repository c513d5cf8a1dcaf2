//! Persistence seam: document-store interface plus the in-memory
//! backend used for tests and embedding without a durable engine.

pub mod memory;
pub mod traits;

pub use memory::MemoryStore;
pub use traits::EmailStore;

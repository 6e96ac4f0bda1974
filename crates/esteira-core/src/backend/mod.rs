mod memory;
mod traits;

pub use memory::MemoryBackend;
pub use traits::{Backend, OutgoingMessage, PulledMessage};

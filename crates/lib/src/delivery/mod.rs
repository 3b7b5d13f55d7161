//! Reply delivery pipeline: chunk generated text, build platform message batches, and send them
//! with the reply token or by push.

mod builder;
mod chunk;
mod coordinator;

pub use builder::{build_batch, MessageBatch, BUBBLES_PER_CAROUSEL};
pub use chunk::{chunk_lines, chunk_sentences, chunk_text, ChunkOptions};
pub use coordinator::{DeliveryCoordinator, DeliveryOutcome, DeliveryState};

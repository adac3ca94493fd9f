//! Progressive Token Manager and Chat Trimmer.

pub mod chunker;
pub mod checkpoint;
pub mod trimmer;

pub use chunker::{
    compress_messages, create_progressive_chunks, emergency_truncate, generate_chunk_summary,
    process_chunks_progressively, Chunk, ChunkContext, ChunkMetadata, ChunkOutcome, ChunkProcessor,
    CoreMessage, MessageRole, ProgressEvent, SummaryCache,
};
pub use checkpoint::{Checkpoint, CheckpointState, CheckpointStore};
pub use trimmer::trim_for_model;

//! Snapshot-at-the-beginning write barrier buffer.
//!
//! Mutators record overwritten references into fixed-size [`TreapNode`]s.
//! Full nodes are retired onto a lock-free list, which the collector drains
//! into its mark stack. Nodes are carved out of arena pages obtained from a
//! [`PagePool`](crate::PagePool) and recycled forever; pages are returned
//! only by [`SatbBuffer::fini`].

pub mod arena;
mod buffer;
pub mod list;
mod mutator;
mod node;

pub use buffer::{BufferState, NodeRef, SatbBuffer};
pub use mutator::MutatorBuffer;
pub use node::{TreapNode, CACHE_LINE_SIZE, CAPACITY, NODE_SIZE};

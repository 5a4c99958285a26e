//! Write-barrier buffering for concurrent marking garbage collectors.
//!
//! `satb-gc` provides the two pieces of a snapshot-at-the-beginning (SATB)
//! collector that sit between mutator threads and the marker:
//!
//! - **[`SatbBuffer`]**: a process-wide buffer that records the old value of
//!   every pointer field overwritten during concurrent marking, so the
//!   marker still sees every object that was reachable when marking began.
//! - **[`HeapBitmapManager`]**: owner of one large virtual memory reservation
//!   used as a mark bitmap indexed by heap address.
//!
//! The crate does not allocate or trace objects. It talks to the heap
//! through the [`GcHeap`] and [`RegionSpace`] traits.
//!
//! # Quick Start
//!
//! ```ignore
//! use satb_gc::{MutatorBuffer, SatbBuffer};
//!
//! let buffer = SatbBuffer::instance();
//! buffer.init();
//!
//! // Each mutator thread:
//! let mut barrier = MutatorBuffer::new(buffer);
//! barrier.remember(&heap, old_value);
//!
//! // The collector:
//! let mut mark_stack = Vec::new();
//! buffer.get_retired_objects(&mut mark_stack);
//! ```
//!
//! # Thread Safety
//!
//! `SatbBuffer` and `HeapBitmapManager` are `Sync`. A [`MutatorBuffer`] is
//! owned by one thread at a time. [`SatbBuffer::fini`] is `unsafe`: it
//! requires every mutator to be quiescent.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod bitmap;
mod config;
mod logging;
mod metrics;
mod object;
mod page_pool;
pub mod satb;
mod space;

pub use bitmap::{HeapBitmap, HeapBitmapManager};
pub use config::{
    HeapBitmapConfig, SatbConfig, DEFAULT_INITIAL_PAGES, DEFAULT_MAX_HEAP_CAPACITY,
    DEFAULT_REGION_UNIT,
};
pub use metrics::SatbMetrics;
pub use object::{BaseObject, ObjectRef};
pub use page_pool::{CountingPagePool, MmapPagePool, PagePool};
pub use satb::list::{LockFreeList, LockedList, NodeList};
pub use satb::{BufferState, MutatorBuffer, NodeRef, SatbBuffer, TreapNode};
pub use space::{GcHeap, GcReason, RegionSpace};

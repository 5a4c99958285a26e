//! Enqueue filtering against a stub region space.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use common::{obj, StubHeap};
use satb_gc::{SatbBuffer, SatbConfig};

fn buffer(generational: bool) -> SatbBuffer {
    SatbBuffer::new(SatbConfig {
        generational,
        ..SatbConfig::default()
    })
}

#[test]
fn test_null_is_never_enqueued() {
    let heap = StubHeap::default();
    assert!(!buffer(false).should_enqueue(&heap, None));
    assert_eq!(heap.space.claimed_count(), 0);
}

#[test]
fn test_new_object_since_trace_is_skipped() {
    let heap = StubHeap::default();
    heap.space.allocate_during_trace(obj(1));
    assert!(!buffer(false).should_enqueue(&heap, Some(obj(1))));
    assert_eq!(heap.space.claimed_count(), 0, "no claim for new objects");
}

#[test]
fn test_marked_object_is_skipped() {
    let heap = StubHeap::default();
    heap.space.mark(obj(2));
    assert!(!buffer(false).should_enqueue(&heap, Some(obj(2))));
    assert_eq!(heap.space.claimed_count(), 0);
}

#[test]
fn test_unmarked_object_is_claimed_once() {
    let heap = StubHeap::default();
    let buffer = buffer(false);
    assert!(buffer.should_enqueue(&heap, Some(obj(3))));
    assert!(!buffer.should_enqueue(&heap, Some(obj(3))));
    assert!(buffer.should_enqueue(&heap, Some(obj(4))));
    assert_eq!(heap.space.claimed_count(), 2);
}

#[test]
fn test_concurrent_claim_has_exactly_one_winner() {
    let heap = StubHeap::default();
    let buffer = buffer(false);
    let winners = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                if buffer.should_enqueue(&heap, Some(obj(42))) {
                    winners.fetch_add(1, Ordering::Relaxed);
                }
            });
        }
    });
    assert_eq!(winners.load(Ordering::Relaxed), 1);
}

#[test]
fn test_young_collection_filters_old_objects_when_generational() {
    let heap = StubHeap::default();
    heap.space.make_young(obj(5));
    heap.set_young_gc(true);

    let generational = buffer(true);
    assert!(!generational.should_enqueue(&heap, Some(obj(6))));
    assert!(generational.should_enqueue(&heap, Some(obj(5))));

    // Full collections record old objects too.
    heap.set_young_gc(false);
    assert!(generational.should_enqueue(&heap, Some(obj(6))));
}

#[test]
fn test_non_generational_ignores_young_space() {
    let heap = StubHeap::default();
    heap.set_young_gc(true);
    assert!(buffer(false).should_enqueue(&heap, Some(obj(7))));
}

#[test]
fn test_should_enqueue_does_not_touch_the_buffer() {
    let heap = StubHeap::default();
    let buffer = buffer(false);
    for i in 0..100 {
        buffer.should_enqueue(&heap, Some(obj(i)));
    }
    let metrics = buffer.metrics();
    assert_eq!(metrics.pages_allocated, 0);
    assert_eq!(metrics.nodes_retired, 0);
}

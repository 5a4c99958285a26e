//! Shared heap stubs for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use parking_lot::Mutex;
use satb_gc::{GcHeap, GcReason, ObjectRef, RegionSpace};

/// Address of the `i`-th fake object. Never dereferenced.
pub fn obj(i: usize) -> ObjectRef {
    ObjectRef::from_addr(0x1000 + i * 16).unwrap()
}

/// Region space backed by address sets and a claim set.
#[derive(Default)]
pub struct StubSpace {
    new_objects: Mutex<HashSet<usize>>,
    marked: Mutex<HashSet<usize>>,
    young: Mutex<HashSet<usize>>,
    claimed: Mutex<HashSet<usize>>,
}

impl StubSpace {
    pub fn allocate_during_trace(&self, obj: ObjectRef) {
        self.new_objects.lock().insert(obj.addr());
    }

    pub fn mark(&self, obj: ObjectRef) {
        self.marked.lock().insert(obj.addr());
    }

    pub fn make_young(&self, obj: ObjectRef) {
        self.young.lock().insert(obj.addr());
    }

    pub fn claimed_count(&self) -> usize {
        self.claimed.lock().len()
    }
}

impl RegionSpace for StubSpace {
    fn is_new_object_since_trace(&self, obj: ObjectRef) -> bool {
        self.new_objects.lock().contains(&obj.addr())
    }

    fn is_marked_object(&self, obj: ObjectRef) -> bool {
        self.marked.lock().contains(&obj.addr())
    }

    fn enqueue_object(&self, obj: ObjectRef) -> bool {
        !self.claimed.lock().insert(obj.addr())
    }

    fn is_young_space_object(&self, obj: ObjectRef) -> bool {
        self.young.lock().contains(&obj.addr())
    }
}

/// Heap whose collection reason can be switched between full and young.
#[derive(Default)]
pub struct StubHeap {
    pub space: StubSpace,
    young_gc: AtomicBool,
}

impl StubHeap {
    pub fn set_young_gc(&self, young: bool) {
        self.young_gc.store(young, Ordering::Relaxed);
    }
}

impl GcHeap for StubHeap {
    fn gc_reason(&self) -> GcReason {
        if self.young_gc.load(Ordering::Relaxed) {
            GcReason::Young
        } else {
            GcReason::Heuristic
        }
    }

    fn region_space(&self) -> &dyn RegionSpace {
        &self.space
    }
}

/// Region space where every object claims a one-shot enqueue byte, as a
/// real object header would.
pub struct ClaimBitSpace {
    bits: Vec<AtomicU8>,
}

impl ClaimBitSpace {
    pub fn new(objects: usize) -> Self {
        Self {
            bits: (0..objects).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    fn index(obj: ObjectRef) -> usize {
        (obj.addr() - 0x1000) / 16
    }
}

impl RegionSpace for ClaimBitSpace {
    fn is_new_object_since_trace(&self, _obj: ObjectRef) -> bool {
        false
    }

    fn is_marked_object(&self, _obj: ObjectRef) -> bool {
        false
    }

    fn enqueue_object(&self, obj: ObjectRef) -> bool {
        self.bits[Self::index(obj)].swap(1, Ordering::AcqRel) != 0
    }
}

impl GcHeap for ClaimBitSpace {
    fn gc_reason(&self) -> GcReason {
        GcReason::Heuristic
    }

    fn region_space(&self) -> &dyn RegionSpace {
        self
    }
}

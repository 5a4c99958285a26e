//! Many threads pushing into and popping from one shared list.

use std::collections::HashSet;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use satb_gc::satb::list::Chain;
use satb_gc::{LockFreeList, LockedList, NodeList, TreapNode};

const THREAD_COUNTS: [usize; 4] = [2, 4, 8, 16];
const PER_THREAD: usize = 1_000;

fn nodes(count: usize) -> Vec<TreapNode> {
    (0..count).map(|_| TreapNode::new()).collect()
}

/// Cheap per-thread xorshift used to decide when to yield.
struct Jitter(u32);

impl Jitter {
    fn new(seed: usize) -> Self {
        Self(u32::try_from(seed % 0xffff).unwrap().wrapping_mul(2_654_435_761) | 1)
    }

    fn pause(&mut self) {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        if self.0 % 8 == 0 {
            thread::yield_now();
        }
    }
}

fn stress<L: NodeList<TreapNode> + Sync>(list: &L, threads: usize) {
    let storage = nodes(threads * PER_THREAD);

    thread::scope(|s| {
        for (t, chunk) in storage.chunks(PER_THREAD).enumerate() {
            s.spawn(move || {
                let mut jitter = Jitter::new(t + threads);
                for node in chunk {
                    unsafe { list.push(NonNull::from(node)) };
                    jitter.pause();
                }
            });
        }
    });

    let drained: Vec<usize> = unsafe { Chain::new(list.pop_all()) }
        .map(|node| node.as_ptr() as usize)
        .collect();
    let unique: HashSet<usize> = drained.iter().copied().collect();

    assert_eq!(drained.len(), threads * PER_THREAD, "{threads} threads");
    assert_eq!(unique.len(), threads * PER_THREAD, "no node may appear twice");
    assert!(list.is_empty());
}

#[test]
fn test_lock_free_push_then_pop_all() {
    for threads in THREAD_COUNTS {
        stress(&LockFreeList::<TreapNode>::new(), threads);
    }
}

#[test]
fn test_locked_push_then_pop_all() {
    for threads in THREAD_COUNTS {
        stress(&LockedList::<TreapNode>::new(), threads);
    }
}

#[test]
fn test_lock_free_concurrent_pop_hands_out_each_node_once() {
    for threads in THREAD_COUNTS {
        let storage = nodes(threads * PER_THREAD);
        let list = LockFreeList::<TreapNode>::new();
        for node in &storage {
            unsafe { list.push(NonNull::from(node)) };
        }

        let popped: Vec<usize> = thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(|| {
                        let mut mine = Vec::new();
                        while let Some(node) = list.pop() {
                            mine.push(node.as_ptr() as usize);
                        }
                        mine
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let unique: HashSet<usize> = popped.iter().copied().collect();
        assert_eq!(popped.len(), threads * PER_THREAD);
        assert_eq!(unique.len(), threads * PER_THREAD);
        assert!(list.is_empty());
    }
}

// Nodes cycle out of the list and back in, the way free nodes do between
// mutators and the collector drain.
#[test]
fn test_lock_free_pop_two_push_back_hands_out_each_node_once() {
    const NODES: usize = 6;
    const ROUNDS: usize = 2_000;

    for threads in THREAD_COUNTS {
        let storage = nodes(NODES);
        let owned: Vec<AtomicBool> = (0..NODES).map(|_| AtomicBool::new(false)).collect();
        let index_of = |node: NonNull<TreapNode>| {
            storage
                .iter()
                .position(|n| std::ptr::eq(n, node.as_ptr()))
                .unwrap()
        };
        let list = LockFreeList::<TreapNode>::new();
        for node in &storage {
            unsafe { list.push(NonNull::from(node)) };
        }
        let duplicates = AtomicUsize::new(0);

        thread::scope(|s| {
            for t in 0..threads {
                let (storage, list, owned, duplicates) = (&storage, &list, &owned, &duplicates);
                s.spawn(move || {
                    let mut jitter = Jitter::new(t);
                    for _ in 0..ROUNDS {
                        let taken: Vec<usize> = (0..2)
                            .filter_map(|_| list.pop())
                            .map(index_of)
                            .collect();
                        for &i in &taken {
                            if owned[i].swap(true, Ordering::AcqRel) {
                                duplicates.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                        jitter.pause();
                        for i in taken {
                            owned[i].store(false, Ordering::Release);
                            unsafe { list.push(NonNull::from(&storage[i])) };
                        }
                    }
                });
            }
        });

        assert_eq!(duplicates.load(Ordering::Relaxed), 0, "{threads} threads");
        assert_eq!(unsafe { Chain::new(list.pop_all()) }.count(), NODES);
    }
}

#[cfg(test)]
pub mod test {
    use std::{
        collections::HashSet,
        sync::{Arc, Mutex},
        thread,
    };

    use crate::{
        index::{ExtendibleHash, HashTable},
        utils::replacer::{LRUReplacer, Replacer},
    };

    const NUM_THREADS: u32 = 8;
    const KEYS_PER_THREAD: u32 = 2_000;

    #[test]
    fn parallel_inserts() {
        let table = Arc::new(ExtendibleHash::<u32, u32>::new(4).unwrap());

        thread::scope(|scope| {
            for thread_id in 0..NUM_THREADS {
                let table = Arc::clone(&table);
                scope.spawn(move || {
                    let start = thread_id * KEYS_PER_THREAD;
                    for key in start..start + KEYS_PER_THREAD {
                        table.insert(key, key * 2).unwrap();
                    }
                });
            }
        });

        assert_eq!((NUM_THREADS * KEYS_PER_THREAD) as usize, table.len());
        for key in 0..NUM_THREADS * KEYS_PER_THREAD {
            assert_eq!(Some(key * 2), table.find(&key));
        }

        let snapshot = table.snapshot();
        assert_eq!(Ok(()), snapshot.check_invariants());
        assert_eq!(table.num_buckets(), snapshot.num_buckets());
    }

    #[test]
    fn readers_never_see_torn_values() {
        let table = ExtendibleHash::<u32, u32>::new(2).unwrap();

        thread::scope(|scope| {
            for thread_id in 0..NUM_THREADS / 2 {
                let table = &table;
                scope.spawn(move || {
                    let start = thread_id * KEYS_PER_THREAD;
                    for key in start..start + KEYS_PER_THREAD {
                        table.insert(key, key + 1).unwrap();
                    }
                });
            }

            for _ in 0..NUM_THREADS / 2 {
                let table = &table;
                scope.spawn(move || {
                    for _ in 0..4 {
                        for key in 0..NUM_THREADS / 2 * KEYS_PER_THREAD {
                            if let Some(value) = table.find(&key) {
                                assert_eq!(key + 1, value);
                            }
                        }
                    }
                });
            }
        });

        for key in 0..NUM_THREADS / 2 * KEYS_PER_THREAD {
            assert_eq!(Some(key + 1), table.find(&key));
        }
        assert_eq!(Ok(()), table.snapshot().check_invariants());
    }

    #[test]
    fn parallel_removes_with_inserts() {
        let table = ExtendibleHash::<u32, u32>::new(4).unwrap();
        let total = NUM_THREADS * KEYS_PER_THREAD;

        // Even keys exist up front and get removed, odd keys are added
        for key in (0..total).step_by(2) {
            table.insert(key, key).unwrap();
        }

        thread::scope(|scope| {
            for thread_id in 0..NUM_THREADS {
                let table = &table;
                scope.spawn(move || {
                    let start = thread_id * KEYS_PER_THREAD;
                    for key in start..start + KEYS_PER_THREAD {
                        if key % 2 == 0 {
                            assert!(table.remove(&key));
                        } else {
                            table.insert(key, key).unwrap();
                        }
                    }
                });
            }
        });

        assert_eq!((total / 2) as usize, table.len());
        for key in 0..total {
            let expected = if key % 2 == 0 { None } else { Some(key) };
            assert_eq!(expected, table.find(&key));
        }
        assert_eq!(Ok(()), table.snapshot().check_invariants());
    }

    #[test]
    fn replacer_parallel_inserts_then_drain() {
        let replacer = LRUReplacer::with_capacity((NUM_THREADS * KEYS_PER_THREAD) as usize);

        thread::scope(|scope| {
            for thread_id in 0..NUM_THREADS {
                let replacer = &replacer;
                scope.spawn(move || {
                    let start = thread_id * KEYS_PER_THREAD;
                    for frame_id in start..start + KEYS_PER_THREAD {
                        replacer.insert(frame_id);
                        // Touch it again, must not duplicate
                        replacer.insert(frame_id);
                    }
                });
            }
        });

        assert_eq!((NUM_THREADS * KEYS_PER_THREAD) as usize, replacer.size());

        let victims = Mutex::new(Vec::new());
        thread::scope(|scope| {
            for _ in 0..NUM_THREADS {
                let replacer = &replacer;
                let victims = &victims;
                scope.spawn(move || {
                    while let Some(frame_id) = replacer.victim() {
                        victims.lock().unwrap().push(frame_id);
                    }
                });
            }
        });

        let victims = victims.into_inner().unwrap();
        let unique: HashSet<u32> = victims.iter().copied().collect();

        assert_eq!((NUM_THREADS * KEYS_PER_THREAD) as usize, victims.len());
        assert_eq!(victims.len(), unique.len());
        assert_eq!(0, replacer.size());
    }

    #[test]
    fn replacer_concurrent_erase() {
        let replacer = LRUReplacer::new();
        for frame_id in 0..1_000u32 {
            replacer.insert(frame_id);
        }

        // Every thread tries to erase every frame, only one may succeed per frame
        let erased = Mutex::new(0usize);
        thread::scope(|scope| {
            for _ in 0..4 {
                let replacer = &replacer;
                let erased = &erased;
                scope.spawn(move || {
                    let mut count = 0;
                    for frame_id in 0..1_000u32 {
                        if replacer.erase(frame_id) {
                            count += 1;
                        }
                    }
                    *erased.lock().unwrap() += count;
                });
            }
        });

        assert_eq!(1_000, erased.into_inner().unwrap());
        assert_eq!(0, replacer.size());
    }
}

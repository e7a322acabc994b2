// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Deduplicates concurrent upstream fetches for the same CID: at most one
//! `ObjectStore::fetch` call per CID is ever in flight at a time. Every
//! other caller blocks on a condvar and receives the same result.

use crate::Cid;
use std::sync::{Arc, Condvar, Mutex};

enum SlotState {
    Pending,
    Done(crate::Result<Arc<[u8]>>),
}

struct Slot {
    state: Mutex<SlotState>,
    signal: Condvar,
}

/// Tracks fetches currently in progress, keyed by CID.
#[derive(Default)]
pub(super) struct InFlightTable {
    slots: Mutex<rustc_hash::FxHashMap<Cid, Arc<Slot>>>,
}

/// What the caller should do after registering interest in a CID.
pub(super) enum Lease {
    /// This caller is the leader: nobody else is fetching this CID. It must
    /// call [`InFlightTable::publish`] exactly once when done.
    Leader,
    /// Another caller is already fetching; wait on this slot instead.
    Follower(Arc<Slot>),
}

impl InFlightTable {
    /// Registers interest in `cid`. The first caller becomes the leader and
    /// is responsible for performing the fetch and calling `publish`;
    /// everyone else becomes a follower and should call `Self::wait`.
    pub(super) fn register(&self, cid: &Cid) -> Lease {
        let mut slots = self.slots.lock().expect("lock poisoned");
        if let Some(existing) = slots.get(cid) {
            return Lease::Follower(existing.clone());
        }

        slots.insert(
            cid.clone(),
            Arc::new(Slot {
                state: Mutex::new(SlotState::Pending),
                signal: Condvar::new(),
            }),
        );
        Lease::Leader
    }

    /// Blocks the calling thread until the leader publishes a result for
    /// `slot`.
    pub(super) fn wait(slot: &Slot) -> crate::Result<Arc<[u8]>> {
        let mut state = slot.state.lock().expect("lock poisoned");
        while matches!(*state, SlotState::Pending) {
            state = slot.signal.wait(state).expect("lock poisoned");
        }

        match &*state {
            SlotState::Done(result) => result.clone(),
            SlotState::Pending => unreachable!("loop only exits once Done"),
        }
    }

    /// Called by the leader once the upstream fetch completes (success or
    /// failure), waking every follower and retiring the slot.
    pub(super) fn publish(&self, cid: &Cid, result: crate::Result<Arc<[u8]>>) {
        let mut slots = self.slots.lock().expect("lock poisoned");
        if let Some(slot) = slots.remove(cid) {
            let mut state = slot.state.lock().expect("lock poisoned");
            *state = SlotState::Done(result);
            slot.signal.notify_all();
        }
    }

    /// Number of fetches currently in flight, for diagnostics/tests.
    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.slots.lock().expect("lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn concurrent_followers_share_one_fetch() {
        let table = Arc::new(InFlightTable::default());
        let cid = Cid::parse("a").unwrap();
        let fetch_calls = Arc::new(AtomicU64::new(0));

        let leader_table = table.clone();
        let leader_cid = cid.clone();
        let leader_calls = fetch_calls.clone();
        let leader = thread::spawn(move || {
            let Lease::Leader = leader_table.register(&leader_cid) else {
                panic!("expected to be leader");
            };
            thread::sleep(Duration::from_millis(20));
            leader_calls.fetch_add(1, Ordering::SeqCst);
            leader_table.publish(&leader_cid, Ok(Arc::from(b"payload".as_slice())));
        });

        thread::sleep(Duration::from_millis(5));

        let followers: Vec<_> = (0..4)
            .map(|_| {
                let table = table.clone();
                let cid = cid.clone();
                thread::spawn(move || match table.register(&cid) {
                    Lease::Leader => panic!("only one leader expected"),
                    Lease::Follower(slot) => InFlightTable::wait(&slot).unwrap(),
                })
            })
            .collect();

        leader.join().unwrap();
        for follower in followers {
            assert_eq!(&*follower.join().unwrap(), b"payload");
        }

        assert_eq!(fetch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn publish_propagates_errors_to_followers() {
        let table = Arc::new(InFlightTable::default());
        let cid = Cid::parse("a").unwrap();

        let Lease::Leader = table.register(&cid) else {
            panic!("expected leader");
        };

        let waiter_table = table.clone();
        let waiter_cid = cid.clone();
        let waiter = thread::spawn(move || match waiter_table.register(&waiter_cid) {
            Lease::Follower(slot) => InFlightTable::wait(&slot),
            Lease::Leader => panic!("should be follower"),
        });

        thread::sleep(Duration::from_millis(5));
        table.publish(&cid, Err(crate::Error::NotFound));

        assert!(matches!(waiter.join().unwrap(), Err(crate::Error::NotFound)));
    }
}

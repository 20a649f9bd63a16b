//! Commit coordination: persistence by reachability plus the all-or-nothing
//! write of every pending object.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info};

use amber_types::Oid;

use crate::cell::ObjHandle;
use crate::error::{EngineError, EngineResult};
use crate::storage::StorageCore;

/// Breadth-first closure over `roots`: every transient object reachable
/// through a link from a processed object is made persistent (OID assigned,
/// table entry created, marked modified) and the link is rewritten to its
/// OID form. Cycle-safe via an explicit visited set; no unbounded recursion.
///
/// Returns every object that is dirty once the closure is complete, in
/// ascending OID order.
pub(crate) fn reachability_closure(
    core: &Arc<StorageCore>,
    roots: Vec<ObjHandle>,
) -> EngineResult<Vec<ObjHandle>> {
    let mut visited: HashSet<Oid> = roots.iter().map(ObjHandle::oid).collect();
    let mut queue: VecDeque<ObjHandle> = roots.iter().cloned().collect();
    let mut pending = roots;

    while let Some(handle) = queue.pop_front() {
        let mut newly_persistent = Vec::new();
        {
            let mut body = handle.cell.body.lock().expect("lock poisoned");
            let Some(body) = body.as_deref_mut() else {
                continue;
            };
            for link in body.links_mut() {
                if let Some(child) = link.ensure_persistent(core)? {
                    newly_persistent.push(child);
                }
            }
        }
        for child in newly_persistent {
            if visited.insert(child.oid()) {
                debug!(oid = %child.oid(), "reachable object made persistent");
                pending.push(child.clone());
                queue.push_back(child);
            }
        }
    }

    pending.sort_by_key(ObjHandle::oid);
    Ok(pending)
}

/// Commit every modified object in the session.
///
/// Phases: reachability closure over the dirty set, encode everything, write
/// everything, then flip states. A failure in any phase returns before any
/// state changes, so every pending object stays modified and the commit can
/// be retried. (Bytes already written for earlier objects are harmless; the
/// retry rewrites them.)
pub(crate) fn commit(core: &Arc<StorageCore>) -> EngineResult<usize> {
    let roots = core.dirty_handles();
    let pending = reachability_closure(core, roots)?;
    if pending.is_empty() {
        debug!("commit: nothing to write");
        return Ok(0);
    }

    let mut writes = Vec::with_capacity(pending.len());
    for handle in &pending {
        let body = handle.cell.body.lock().expect("lock poisoned");
        let obj = body.as_deref().ok_or(EngineError::Unmaterialized)?;
        writes.push((handle.oid(), core.codec.encode(obj)?));
    }

    for (oid, bytes) in &writes {
        core.backing.write_bytes(*oid, bytes)?;
    }

    for handle in &pending {
        handle.set_clean();
    }
    core.table.lock().expect("lock poisoned").clear_all_dirty();
    info!(objects = pending.len(), "commit complete");
    Ok(pending.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{registry, EagerNode, LazyNode, Team};
    use crate::link::Link;
    use crate::storage::Storage;
    use amber_store::{BackingStore, FailingStore, InMemoryBackingStore};
    use amber_types::ObjectState;

    fn mem_storage() -> Storage {
        Storage::open(InMemoryBackingStore::new(), registry())
    }

    #[test]
    fn commit_with_no_dirty_objects_writes_nothing() {
        let storage = mem_storage();
        assert_eq!(storage.commit().unwrap(), 0);
    }

    #[test]
    fn commit_transitions_modified_to_loaded() {
        let storage = mem_storage();
        let handle = ObjHandle::new(EagerNode::new("a"));
        handle.make_persistent(&storage).unwrap();
        assert!(handle.is_modified());

        let written = storage.commit().unwrap();
        assert_eq!(written, 1);
        assert_eq!(handle.state(), ObjectState::Loaded);
        assert_eq!(storage.dirty_count(), 0);

        // Nothing left to write.
        assert_eq!(storage.commit().unwrap(), 0);
    }

    #[test]
    fn commit_persists_reachable_transient() {
        let storage = mem_storage();
        let c = ObjHandle::new(EagerNode::new("c"));
        let a = ObjHandle::new(EagerNode::new("a"));
        a.update(|n: &mut EagerNode| n.next = Link::to(&c)).unwrap();
        a.make_persistent(&storage).unwrap();
        assert!(!c.is_persistent());

        storage.commit().unwrap();

        assert!(c.is_persistent());
        assert!(!c.oid().is_null());
        assert_eq!(c.state(), ObjectState::Loaded);
        assert!(c.storage().unwrap().same_storage(&storage));
        // The link now carries the OID, not the object.
        let next_oid = a.with(|n: &EagerNode| n.next.oid()).unwrap();
        assert_eq!(next_oid, Some(c.oid()));
    }

    #[test]
    fn commit_closes_over_chains_of_transients() {
        let storage = mem_storage();
        let c3 = ObjHandle::new(EagerNode::new("c3"));
        let c2 = ObjHandle::new(EagerNode::new("c2"));
        c2.update(|n: &mut EagerNode| n.next = Link::to(&c3)).unwrap();
        let c1 = ObjHandle::new(EagerNode::new("c1"));
        c1.update(|n: &mut EagerNode| n.next = Link::to(&c2)).unwrap();
        c1.make_persistent(&storage).unwrap();

        let written = storage.commit().unwrap();
        assert_eq!(written, 3);
        for handle in [&c1, &c2, &c3] {
            assert!(handle.is_persistent());
            assert_eq!(handle.state(), ObjectState::Loaded);
        }
    }

    #[test]
    fn commit_handles_cyclic_graphs() {
        let storage = mem_storage();
        let a = ObjHandle::new(EagerNode::new("a"));
        let b = ObjHandle::new(EagerNode::new("b"));
        a.update(|n: &mut EagerNode| n.next = Link::to(&b)).unwrap();
        b.update(|n: &mut EagerNode| n.next = Link::to(&a)).unwrap();
        a.make_persistent(&storage).unwrap();

        let written = storage.commit().unwrap();
        assert_eq!(written, 2);
        assert!(a.is_persistent() && b.is_persistent());

        // Links on both sides are OID form now; no Arc cycle remains.
        let a_next = a.with(|n: &EagerNode| n.next.oid()).unwrap();
        let b_next = b.with(|n: &EagerNode| n.next.oid()).unwrap();
        assert_eq!(a_next, Some(b.oid()));
        assert_eq!(b_next, Some(a.oid()));
    }

    #[test]
    fn cyclic_graph_reloads_from_fresh_session() {
        let backing = Arc::new(InMemoryBackingStore::new());
        let a_oid;
        {
            let storage = Storage::open(backing.clone(), registry());
            let a = ObjHandle::new(EagerNode::new("a"));
            let b = ObjHandle::new(EagerNode::new("b"));
            a.update(|n: &mut EagerNode| n.next = Link::to(&b)).unwrap();
            b.update(|n: &mut EagerNode| n.next = Link::to(&a)).unwrap();
            a_oid = a.make_persistent(&storage).unwrap();
            storage.commit().unwrap();
        }

        let storage = Storage::open(backing, registry());
        let a = storage.resolve(a_oid).unwrap();
        // Recursive load over the cycle terminates and loads both.
        a.load().unwrap();
        let b = a
            .with(|n: &EagerNode| n.next.clone())
            .unwrap()
            .get(&storage)
            .unwrap()
            .unwrap();
        assert_eq!(b.state(), ObjectState::Loaded);
        let back = b.with(|n: &EagerNode| n.next.oid()).unwrap();
        assert_eq!(back, Some(a_oid));
    }

    #[test]
    fn commit_persists_link_vec_members() {
        let storage = mem_storage();
        let m1 = ObjHandle::new(EagerNode::new("m1"));
        let m2 = ObjHandle::new(EagerNode::new("m2"));
        let m3 = ObjHandle::new(EagerNode::new("m3"));
        let team = ObjHandle::new(Team::new("core"));
        team.update(|t: &mut Team| {
            t.members.push(&m1);
            t.members.push(&m2);
            t.members.push(&m3);
        })
        .unwrap();
        team.make_persistent(&storage).unwrap();

        let written = storage.commit().unwrap();
        assert_eq!(written, 4);
        for member in [&m1, &m2, &m3] {
            assert!(member.is_persistent());
            assert_eq!(member.state(), ObjectState::Loaded);
        }
        let has_m2 = team
            .with(|t: &Team| t.members.contains_oid(m2.oid()))
            .unwrap();
        assert!(has_m2);
    }

    #[test]
    fn commit_does_not_touch_clean_objects() {
        let storage = mem_storage();
        let clean = ObjHandle::new(EagerNode::new("clean"));
        clean.make_persistent(&storage).unwrap();
        storage.commit().unwrap();

        let dirty = ObjHandle::new(EagerNode::new("dirty"));
        dirty.make_persistent(&storage).unwrap();
        let written = storage.commit().unwrap();
        assert_eq!(written, 1);
        assert_eq!(clean.state(), ObjectState::Loaded);
    }

    #[test]
    fn failed_commit_leaves_every_object_modified_and_is_retryable() {
        let backing = Arc::new(FailingStore::new(InMemoryBackingStore::new()));
        let storage = Storage::open(backing.clone(), registry());

        let handles: Vec<ObjHandle> = (0..3)
            .map(|i| {
                let h = ObjHandle::new(EagerNode::new(&format!("n{i}")));
                h.make_persistent(&storage).unwrap();
                h
            })
            .collect();

        // Second of three writes fails.
        backing.fail_write_after(1);
        let err = storage.commit().unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));
        for handle in &handles {
            assert_eq!(handle.state(), ObjectState::Modified);
        }
        assert_eq!(storage.dirty_count(), 3);

        // Fault cleared: the retry writes all three.
        backing.clear_faults();
        let written = storage.commit().unwrap();
        assert_eq!(written, 3);
        for handle in &handles {
            assert_eq!(handle.state(), ObjectState::Loaded);
        }
    }

    #[test]
    fn first_write_failure_leaves_store_untouched() {
        let backing = Arc::new(FailingStore::new(InMemoryBackingStore::new()));
        let storage = Storage::open(backing.clone(), registry());
        let handle = ObjHandle::new(EagerNode::new("a"));
        handle.make_persistent(&storage).unwrap();

        backing.fail_write_after(0);
        assert!(storage.commit().is_err());
        assert_eq!(handle.state(), ObjectState::Modified);
        assert!(!backing.inner().contains(handle.oid()).unwrap());
    }

    #[test]
    fn mixed_policy_graph_commits_fully() {
        // A lazy object's references still become persistent at commit;
        // the loading policy only affects load, never reachability.
        let storage = mem_storage();
        let target = ObjHandle::new(EagerNode::new("target"));
        let lazy = ObjHandle::new(LazyNode::new("lazy"));
        lazy.update(|n: &mut LazyNode| n.next = Link::to(&target))
            .unwrap();
        lazy.make_persistent(&storage).unwrap();

        storage.commit().unwrap();
        assert!(target.is_persistent());
        assert_eq!(target.state(), ObjectState::Loaded);
    }
}

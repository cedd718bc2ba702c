use super::*;

#[derive(Default, Debug, PartialEq)]
struct Payload(u32);

#[test]
fn alloc_returns_generation_one_on_first_use() {
    let mut pool: Pool<Payload> = Pool::new();
    let (h, item) = pool.alloc().unwrap();
    item.0 = 42;
    assert_eq!(h.generation, 1);
    assert_eq!(pool.get(h), Some(&Payload(42)));
}

#[test]
fn generational_safety_after_free() {
    let mut pool: Pool<Payload> = Pool::new();
    let (h, _) = pool.alloc().unwrap();
    pool.free(h).unwrap();
    assert!(pool.get(h).is_none());

    // Reallocating the same slot must not resurrect the old handle.
    let (h2, _) = pool.alloc().unwrap();
    assert_eq!(h2.index, h.index);
    assert_ne!(h2.generation, h.generation);
    assert!(pool.get(h).is_none());
    assert!(pool.get(h2).is_some());
}

#[test]
fn free_is_noop_on_stale_handle() {
    let mut pool: Pool<Payload> = Pool::new();
    let (h, _) = pool.alloc().unwrap();
    pool.free(h).unwrap();
    // Freeing the same (now-stale) handle again must be a no-op, not a
    // double-free of the slot's generation.
    assert!(pool.free(h).is_none());
}

#[test]
fn free_is_noop_on_out_of_range_handle() {
    let mut pool: Pool<Payload> = Pool::new();
    let bogus: Handle<Payload> = Handle::new(999, 1);
    assert!(pool.free(bogus).is_none());
    assert!(pool.get(bogus).is_none());
}

#[test]
fn pool_accounting_invariant_holds_across_alloc_free_cycles() {
    let mut pool: Pool<Payload> = Pool::new();
    let mut handles = Vec::new();
    for _ in 0..10 {
        handles.push(pool.alloc().unwrap().0);
    }
    for h in handles.drain(0..5) {
        pool.free(h).unwrap();
    }
    for _ in 0..3 {
        handles.push(pool.alloc().unwrap().0);
    }

    assert_eq!(pool.active_count(), 8);
}

#[test]
fn capacity_cap_rejects_overflow() {
    let mut pool: Pool<Payload> = Pool::with_capacity(2);
    assert!(pool.alloc().is_some());
    assert!(pool.alloc().is_some());
    assert!(pool.alloc().is_none());
}

#[test]
fn null_handle_never_resolves() {
    let pool: Pool<Payload> = Pool::new();
    assert!(pool.get(Handle::<Payload>::null()).is_none());
}

#[test]
fn generation_skips_zero_on_wrap() {
    let mut pool: Pool<Payload> = Pool::new();
    let (h, _) = pool.alloc().unwrap();

    // Force the slot's generation counter to the wrap boundary.
    {
        let entry = pool.entries.get_mut(h.index as usize).unwrap();
        entry.generation = u32::MAX;
    }
    let stale = Handle::<Payload>::new(h.index, u32::MAX);
    pool.free(stale).unwrap();

    let (h2, _) = pool.alloc().unwrap();
    assert_eq!(h2.generation, 1);
    assert_ne!(h2.generation, 0);
}

#[test]
fn alloc_zero_initializes_recycled_slot() {
    let mut pool: Pool<Payload> = Pool::new();
    let (h, item) = pool.alloc().unwrap();
    item.0 = 123;
    pool.free(h).unwrap();
    let (h2, item2) = pool.alloc().unwrap();
    assert_eq!(h2.index, h.index);
    assert_eq!(item2.0, 0);
}

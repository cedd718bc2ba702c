use super::*;

fn two_class_slab() -> SlabAllocator {
    SlabAllocator::new(&[
        SizeClass { block_size: 64, block_count: 4 },
        SizeClass { block_size: 256, block_count: 2 },
    ])
}

#[test]
fn capacity_is_sum_over_classes() {
    let slab = two_class_slab();
    assert_eq!(slab.capacity(), 64 * 4 + 256 * 2);
}

#[test]
fn alloc_picks_smallest_fitting_class() {
    let mut slab = two_class_slab();
    let offset = slab.alloc(10).unwrap();
    assert!(offset < 64 * 4, "should come from the 64-block class, not the 256 one");
}

#[test]
fn alloc_falls_through_to_larger_class_when_small_class_is_full() {
    let mut slab = two_class_slab();
    for _ in 0..4 {
        slab.alloc(64).unwrap();
    }
    let offset = slab.alloc(1).unwrap();
    assert!(offset >= 64 * 4, "64-class exhausted, must fall through to 256-class");
}

#[test]
fn alloc_returns_none_on_exhaustion() {
    let mut slab = SlabAllocator::new(&[SizeClass { block_size: 8, block_count: 1 }]);
    assert!(slab.alloc(8).is_some());
    assert!(slab.alloc(8).is_none());
}

#[test]
fn free_returns_block_to_its_own_class() {
    let mut slab = two_class_slab();
    let a = slab.alloc(10).unwrap();
    let b = slab.alloc(10).unwrap();
    slab.free(a);
    let c = slab.alloc(10).unwrap();
    assert_eq!(c, a, "freed offset should be recycled before allocating new territory");
    assert_ne!(b, c);
}

#[test]
fn slab_conservation_invariant() {
    let mut slab = two_class_slab();
    let mut allocated_bytes = 0u32;
    let a = slab.alloc(64).unwrap();
    allocated_bytes += 64;
    let _b = slab.alloc(200).unwrap();
    allocated_bytes += 256;

    assert_eq!(slab.allocated_slots(), allocated_bytes);

    slab.free(a);
    allocated_bytes -= 64;
    assert_eq!(slab.allocated_slots(), allocated_bytes);
}

#[test]
fn every_allocated_offset_lies_within_exactly_one_class_range() {
    let slab_template = two_class_slab();
    let mut slab = two_class_slab();
    let mut offsets = Vec::new();
    for _ in 0..4 {
        offsets.push(slab.alloc(64).unwrap());
    }
    for _ in 0..2 {
        offsets.push(slab.alloc(256).unwrap());
    }

    for offset in offsets {
        let matches: usize = [
            (0u32, 64u32 * 4),
            (64 * 4, 256 * 2),
        ]
        .iter()
        .filter(|(base, extent)| offset >= *base && offset < base + extent)
        .count();
        assert_eq!(matches, 1, "offset {offset} must lie in exactly one class range");
    }
    let _ = slab_template;
}

#[test]
fn fits_within_device_limit() {
    let slab = two_class_slab();
    let element_size = 64; // bytes per Mat4
    let capacity_bytes = slab.capacity() as u64 * element_size;
    assert!(slab.fits_within(capacity_bytes, element_size));
    assert!(!slab.fits_within(capacity_bytes - 1, element_size));
}

//! Basic usage example for `pooled_memory`.
//!
//! This example allocates a logical buffer that is too large for a single segment, works with it
//! through bulk operations and views, grows it in place via a swap and shows how disposed
//! memory is reused by later allocations.

use std::num::NonZero;

use pooled_memory::{
    AllocationOptions, MemoryGroup, OwnedGroup, PooledMemoryAllocator, Segments, copy_to,
    copy_to_slice, fill, get_bounded_slice, swap_contents,
};

fn main() {
    // Every segment may hold at most 4 KiB, so larger buffers are split.
    let allocator = PooledMemoryAllocator::builder()
        .buffer_capacity_in_bytes(NonZero::new(4096).unwrap())
        .build();

    let mut image = OwnedGroup::<u32>::allocate(&allocator, 2500, AllocationOptions::Clean).unwrap();

    println!(
        "Allocated {} elements in {} segments of up to {} elements",
        image.total_length().unwrap(),
        image.count().unwrap(),
        image.buffer_length().unwrap()
    );

    fill(&mut image, 0xFF80_8080).unwrap();

    // Slices are only available within a single segment.
    {
        let mut row = get_bounded_slice(&mut image, 1024, 16).unwrap();
        row.fill(0xFFFF_FFFF);
        println!("Highlighted 16 elements in segment {}", row.segment_index());
    }

    match get_bounded_slice(&mut image, 1020, 16) {
        Ok(_) => println!("Unexpectedly obtained a slice across segments"),
        Err(e) => println!("Slice across a segment boundary rejected: {e}"),
    }

    // Hand a view to someone else, then grow the buffer in place.
    let view = image.view();
    println!("View sees {} elements", view.total_length().unwrap());

    let mut grown = OwnedGroup::<u32>::allocate(&allocator, 5000, AllocationOptions::Clean).unwrap();
    copy_to(&image, &mut grown).unwrap();
    swap_contents(&mut image, &mut grown).unwrap();
    grown.dispose();

    match view.total_length() {
        Ok(length) => println!("Stale view unexpectedly sees {length} elements"),
        Err(e) => println!("Stale view rejected after swap: {e}"),
    }

    println!(
        "Image now has {} elements in {} segments",
        image.total_length().unwrap(),
        image.read().unwrap().iter().count()
    );

    let mut flat = vec![0_u32; image.total_length().unwrap()];
    copy_to_slice(&image, &mut flat).unwrap();
    let highlighted = flat.iter().filter(|&&pixel| pixel == 0xFFFF_FFFF).count();
    println!("Flattened copy contains {highlighted} highlighted elements");

    println!("Pool retains {} bytes before disposal", allocator.retained_bytes());
    image.dispose();
    println!("Pool retains {} bytes after disposal", allocator.retained_bytes());
}

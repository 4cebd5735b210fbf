use std::{panic, ptr::NonNull, thread};

use serial_test::serial;

use nmalloc::{AllocError, NativeAllocator};

static ALLOCATOR: NativeAllocator = NativeAllocator::new();

#[serial]
#[test]
fn warm_up() {
    init_logger();

    ALLOCATOR.warm_up().expect("Warmed up!");
}

#[serial]
#[test]
fn allocate_zero() {
    assert_eq!(Err(AllocError::InvalidArgument), ALLOCATOR.allocate(0));
}

#[serial]
#[test]
fn allocate_write_read() {
    //  Sizes straddling the boundaries of the linear classes, the geometric classes, and the Large category.
    const SIZES: [usize; 10] = [1, 16, 17, 128, 129, 1000, 4096, 16384, 16385, 100_000];

    let pointers: Vec<_> = SIZES.iter()
        .map(|&size| {
            let pointer = ALLOCATOR.allocate(size).expect("Allocated");

            assert_eq!(0, pointer.as_ptr() as usize % 16, "size {}", size);
            assert!(ALLOCATOR.usable_size(pointer).expect("Live") >= size, "size {}", size);

            unsafe { std::ptr::write_bytes(pointer.as_ptr(), canary(size), size) };

            (pointer, size)
        })
        .collect();

    for (pointer, size) in pointers {
        let bytes = unsafe { std::slice::from_raw_parts(pointer.as_ptr(), size) };

        assert!(bytes.iter().all(|&byte| byte == canary(size)), "size {}", size);

        unsafe { ALLOCATOR.free(pointer) };
    }
}

#[serial]
#[test]
fn zero_allocate() {
    //  Dirty a block, then check its reuse is zeroed.
    let dirty = ALLOCATOR.allocate(256).expect("Allocated");
    unsafe { std::ptr::write_bytes(dirty.as_ptr(), 0xFF, 256) };
    unsafe { ALLOCATOR.free(dirty) };

    let pointer = ALLOCATOR.zero_allocate(16, 16).expect("Allocated");
    let bytes = unsafe { std::slice::from_raw_parts(pointer.as_ptr(), 256) };

    assert!(bytes.iter().all(|&byte| byte == 0));

    unsafe { ALLOCATOR.free(pointer) };

    assert_eq!(
        Err(AllocError::IntegerOverflow { count: usize::MAX, size: 2 }),
        ALLOCATOR.zero_allocate(usize::MAX, 2)
    );
}

#[serial]
#[test]
fn try_free_invalid() {
    init_logger();

    let pointer = ALLOCATOR.allocate(48).expect("Allocated");

    let interior = NonNull::new(unsafe { pointer.as_ptr().add(16) }).expect("Not null");
    let address = interior.as_ptr() as usize;

    assert_eq!(Err(AllocError::InvalidFree { address }), unsafe { ALLOCATOR.try_free(interior) });

    assert_eq!(Ok(()), unsafe { ALLOCATOR.try_free(pointer) });

    let address = pointer.as_ptr() as usize;

    assert_eq!(Err(AllocError::InvalidFree { address }), unsafe { ALLOCATOR.try_free(pointer) });
}

#[serial]
#[test]
fn free_foreign() {
    init_logger();

    let mut foreign = [0u8; 64];

    let pointer = NonNull::new(foreign.as_mut_ptr()).expect("Not null");

    let payload = panic::catch_unwind(|| unsafe { ALLOCATOR.free(pointer) }).expect_err("Panicked");

    let message = payload.downcast_ref::<String>().expect("Formatted message");

    assert!(message.starts_with("Invalid free"), "{}", message);
}

#[serial]
#[test]
fn free_cross_thread() {
    let pointers: Vec<_> = (1..=64)
        .map(|i| ALLOCATOR.allocate(i * 8).expect("Allocated").as_ptr() as usize)
        .collect();

    thread::spawn(move || {
        for address in pointers {
            let pointer = NonNull::new(address as *mut u8).expect("Not null");

            unsafe { ALLOCATOR.free(pointer) };
        }
    })
    .join()
    .expect("Joined");
}

#[serial]
#[test]
fn flush_thread_cache() {
    ALLOCATOR.flush_thread_cache();
    assert_eq!(0, ALLOCATOR.cached_blocks());

    let pointers: Vec<_> = (0..10).map(|_| ALLOCATOR.allocate(48).expect("Allocated")).collect();

    for pointer in pointers {
        unsafe { ALLOCATOR.free(pointer) };
    }

    assert!(ALLOCATOR.cached_blocks() >= 10);

    ALLOCATOR.flush_thread_cache();

    assert_eq!(0, ALLOCATOR.cached_blocks());
}

#[serial]
#[test]
fn statistics_large() {
    let before = ALLOCATOR.statistics();

    let pointer = ALLOCATOR.allocate(40_000).expect("Allocated");

    let during = ALLOCATOR.statistics();

    assert_eq!(before.large_objects + 1, during.large_objects);
    assert!(during.live_bytes >= 40_000);
    assert_eq!(40_000, ALLOCATOR.usable_size(pointer).expect("Live"));

    unsafe { ALLOCATOR.free(pointer) };

    let after = ALLOCATOR.statistics();

    assert_eq!(before.large_objects, after.large_objects);
}

#[serial]
#[test]
fn trim() {
    init_logger();

    let pointers: Vec<_> = (0..256).map(|_| ALLOCATOR.allocate(1024).expect("Allocated")).collect();

    for pointer in pointers {
        unsafe { ALLOCATOR.free(pointer) };
    }

    ALLOCATOR.flush_thread_cache();

    //  Fully free spans are retained for reuse, up to a bound, until trimmed.
    assert!(ALLOCATOR.statistics().cached_spans > 0);

    assert!(ALLOCATOR.trim() > 0);

    assert_eq!(0, ALLOCATOR.statistics().cached_spans);
}

//
//  Implementation Details
//

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn canary(size: usize) -> u8 { (size % 251) as u8 }

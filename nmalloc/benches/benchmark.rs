use std::{collections::VecDeque, ptr::NonNull};

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use nmalloc::NativeAllocator;

static ALLOCATOR: NativeAllocator = NativeAllocator::new();

//  Sizes of the linear classes, of the geometric classes, and of the Large category.
const SIZES: [usize; 5] = [32, 128, 1000, 16384, 65536];

//  Round-Trip.
//
//  Repeatedly allocates and deallocates a single block, on a single thread.
//
//  For Small sizes this is the best-case scenario for the thread cache, measuring the lower-bound of allocator
//  latency; for Large sizes every iteration maps, then unmaps, pages.
fn round_trip(c: &mut Criterion) {
    ALLOCATOR.warm_up().expect("Warmed up");

    let mut group = c.benchmark_group("Round-trip");

    for size in SIZES {
        group.bench_with_input(BenchmarkId::new("sys", size), &size, |b, &size| b.iter(|| {
            black_box(SysBuffer::with_size(size))
        }));
        group.bench_with_input(BenchmarkId::new("nm", size), &size, |b, &size| b.iter(|| {
            black_box(NativeBuffer::with_size(size))
        }));
    }

    group.finish();
}

//  Burst.
//
//  Allocates a burst of blocks without deallocating any, on a single thread.
//
//  The thread cache is regularly exhausted, and refilled in batches from the shared bins.
fn burst(c: &mut Criterion) {
    fn bencher<T: Buffer>(group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>, name: &str) {
        group.bench_function(name, |b| b.iter_batched_ref(
            || Vec::<T>::with_capacity(BURST),
            |v| v.push(black_box(T::with_size(32))),
            BatchSize::NumIterations(BURST as u64)
        ));
    }

    ALLOCATOR.warm_up().expect("Warmed up");

    let mut group = c.benchmark_group("Burst");

    bencher::<SysBuffer>(&mut group, "sys");
    bencher::<NativeBuffer>(&mut group, "nm");

    group.finish();
}

//  Sliding Window.
//
//  Keeps a window of live blocks on a single thread, freeing the oldest whenever it allocates a new one.
//
//  The thread cache is regularly flushed to, and refilled from, the shared bins.
fn sliding_window(c: &mut Criterion) {
    fn bencher<T: Buffer>(group: &mut criterion::BenchmarkGroup<'_, criterion::measurement::WallTime>, name: &str) {
        group.bench_function(name, |b| b.iter_batched_ref(
            || (0..BURST - 1).map(|_| T::with_size(32)).collect::<VecDeque<_>>(),
            |window| {
                window.push_back(black_box(T::with_size(32)));
                window.pop_front()
            },
            BatchSize::NumIterations(BURST as u64)
        ));
    }

    ALLOCATOR.warm_up().expect("Warmed up");

    let mut group = c.benchmark_group("Sliding window");

    bencher::<SysBuffer>(&mut group, "sys");
    bencher::<NativeBuffer>(&mut group, "nm");

    group.finish();
}

criterion_group!(single_threaded, round_trip, burst, sliding_window);

criterion_main!(single_threaded);

//
//  Implementation Details
//

const BURST: usize = 1024;

trait Buffer: Sized {
    fn with_size(size: usize) -> Self;
}

type SysBuffer = Vec<u8>;

impl Buffer for SysBuffer {
    fn with_size(size: usize) -> SysBuffer { SysBuffer::with_capacity(size) }
}

//  A raw buffer, freed on drop.
struct NativeBuffer(NonNull<u8>);

impl Buffer for NativeBuffer {
    fn with_size(size: usize) -> NativeBuffer { NativeBuffer(ALLOCATOR.allocate(size).expect("Allocated")) }
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        unsafe { ALLOCATOR.free(self.0) }
    }
}

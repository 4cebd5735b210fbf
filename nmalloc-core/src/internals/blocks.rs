//! Blocks
//!
//! A Block represents a unit of allocation.
//!
//! Whilst allocated, the content of the block is purely in the hands of the user. Whilst deallocated, however, the Block
//! storage is reused to store the link to the next free block of its span.
//!
//! Note: Blocks are never _constructed_, instead raw memory is reinterpreted as blocks.

use core::{
    mem,
    ptr::{self, NonNull},
};

use crate::{PowerOf2, utils};

/// Block.
///
/// A free Block, linked to the next free Block of the same span.
#[repr(C)]
struct Block {
    next: Option<NonNull<Block>>,
}

impl Block {
    /// In-place constructs a `Block`.
    ///
    /// #   Safety
    ///
    /// -   Assumes that access to the memory location is exclusive.
    /// -   Assumes that there is sufficient memory available.
    /// -   Assumes that the pointer is correctly aligned.
    #[allow(clippy::cast_ptr_alignment)]
    unsafe fn initialize(at: NonNull<u8>, next: Option<NonNull<Block>>) -> NonNull<Block> {
        debug_assert!(utils::is_sufficiently_aligned_for(at, Self::alignment()));

        let ptr = at.as_ptr() as *mut Block;

        //  Safety:
        //  -   Access to the memory location is exclusive.
        //  -   `ptr` is assumed to be sufficiently sized and aligned.
        ptr::write(ptr, Block { next });

        at.cast()
    }

    fn alignment() -> PowerOf2 {
        //  Safety:
        //  -   Alignments are always powers of 2.
        unsafe { PowerOf2::new_unchecked(mem::align_of::<Block>()) }
    }
}

/// BlockStack.
///
/// An intrusive LIFO stack of the free blocks of a span.
pub(crate) struct BlockStack {
    head: Option<NonNull<Block>>,
    length: usize,
}

impl BlockStack {
    /// Creates an empty instance.
    pub(crate) fn new() -> Self { Self { head: None, length: 0 } }

    /// Creates an instance holding the `count` blocks of `block_size` bytes starting at `base`.
    ///
    /// The block at `base` is on top of the stack, so that blocks are handed out in address order.
    ///
    /// #   Safety
    ///
    /// -   Assumes that access to the `count * block_size` bytes starting at `base` is exclusive.
    /// -   Assumes that `base` and `block_size` are sufficiently aligned for a link.
    pub(crate) unsafe fn carve(base: NonNull<u8>, block_size: usize, count: usize) -> Self {
        debug_assert!(block_size >= mem::size_of::<Block>());

        let mut stack = Self::new();

        for index in (0..count).rev() {
            //  Safety:
            //  -   `index * block_size` is within the carved region.
            let block = NonNull::new_unchecked(base.as_ptr().add(index * block_size));
            stack.push(block);
        }

        stack
    }

    /// Returns whether the stack is empty, or not.
    pub(crate) fn is_empty(&self) -> bool { self.head.is_none() }

    /// Returns the number of blocks in the stack.
    pub(crate) fn len(&self) -> usize { self.length }

    /// Pops the head of the stack, if any.
    pub(crate) fn pop(&mut self) -> Option<NonNull<u8>> {
        let result = self.head?;

        //  Safety:
        //  -   Non-null, and valid instance, as only free blocks are pushed.
        self.head = unsafe { result.as_ref().next };
        self.length -= 1;

        Some(result.cast())
    }

    /// Pushes the block on top of the stack.
    ///
    /// #   Safety
    ///
    /// -   Assumes that access to the block is exclusive, until it is popped.
    /// -   Assumes that the block is sufficiently sized and aligned for a link.
    pub(crate) unsafe fn push(&mut self, block: NonNull<u8>) {
        self.head = Some(Block::initialize(block, self.head));
        self.length += 1;
    }
}

impl Default for BlockStack {
    fn default() -> Self { Self::new() }
}

//  Safety:
//  -   The BlockStack exclusively owns the free blocks it links.
unsafe impl Send for BlockStack {}

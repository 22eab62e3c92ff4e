//! Reference allocation adapter.

mod random_allocator;

pub use random_allocator::RandomReferenceAllocator;

//! Emulated-machine surface shared by the movie and cheat-search engines.
//!
//! The engines never touch CPU or MMU internals directly. They read memory
//! through [`memory::MemoryAccess`], ask [`machine::Machine`] whether
//! emulation is live, and translate controller input through the
//! [`controller`] structures.

pub mod controller;
pub mod machine;
pub mod memory;

pub use machine::{Console, CoreState, Machine};
pub use memory::{AddressSpace, EmulatedMemory, MemoryAccess, ReadResult};

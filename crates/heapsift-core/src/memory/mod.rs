pub mod layout;
mod pointer;
mod process;
mod reader;
mod region;

#[cfg(test)]
pub mod mock;

pub use pointer::{MAX_VALID_POINTER, MIN_VALID_POINTER, is_valid_pointer};
pub use process::*;
pub use reader::{FromLeBytes, MAX_TRANSFER_SIZE, MemoryReader, ReadMemory};
pub use region::{MemoryRegion, Protection, page};

#[cfg(test)]
pub use mock::{MockMemoryBuilder, MockMemoryReader};

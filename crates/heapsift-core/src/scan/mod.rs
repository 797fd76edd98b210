//! Pattern scanning over target memory

mod cancel;
mod scanner;
mod signature;

pub use cancel::CancelToken;
pub use scanner::{MemoryScanner, find_matches};
pub use signature::{Pattern, format_pattern, parse_pattern};

//! Shared indentation for nested diagnostic output
//!
//! Verbose readers log one line per field and nest sub-structures. Every
//! component holds a clone of the same `LogContext`, so indentation started
//! by one stage carries into the next.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const INDENT_WIDTH: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct LogContext {
    depth: Arc<AtomicUsize>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Increase indentation until the returned guard is dropped
    pub fn indent(&self) -> IndentGuard {
        self.depth.fetch_add(1, Ordering::Relaxed);
        IndentGuard {
            depth: Arc::clone(&self.depth),
        }
    }

    /// Prefix for a line at the current depth
    pub fn pad(&self) -> String {
        " ".repeat(self.depth() * INDENT_WIDTH)
    }
}

#[must_use = "indentation ends when the guard is dropped"]
pub struct IndentGuard {
    depth: Arc<AtomicUsize>,
}

impl Drop for IndentGuard {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_restores_depth() {
        let log = LogContext::new();
        assert_eq!(log.pad(), "");
        {
            let _outer = log.indent();
            assert_eq!(log.pad(), "  ");
            {
                let _inner = log.indent();
                assert_eq!(log.depth(), 2);
                assert_eq!(log.pad(), "    ");
            }
            assert_eq!(log.depth(), 1);
        }
        assert_eq!(log.depth(), 0);
    }

    #[test]
    fn test_clones_share_depth() {
        let log = LogContext::new();
        let other = log.clone();
        let _guard = log.indent();
        assert_eq!(other.depth(), 1);
    }
}

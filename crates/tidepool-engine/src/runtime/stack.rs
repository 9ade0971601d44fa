//! Native stack accounting.
//!
//! The parser and interpreter recurse on the Rust stack, and host callbacks
//! (such as a module loader) re-enter the engine from inside a call. Frame
//! sizes differ between builds, so instead of counting frames the guard
//! compares the address of a local against the position recorded when the
//! engine was first entered, and refuses to recurse once the distance
//! exceeds a byte budget.

use std::cell::Cell;

/// Default native stack budget, measured from the outermost engine entry.
///
/// Leaves headroom on the 2 MiB threads that `std::thread::spawn` creates.
pub const DEFAULT_STACK_BUDGET: usize = 1024 * 1024;

/// Approximate current stack position.
#[inline(never)]
fn position() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}

/// A stack origin and the number of bytes allowed past it.
#[derive(Debug, Clone, Copy)]
pub struct StackLimit {
    origin: usize,
    budget: usize,
}

impl StackLimit {
    /// A limit whose origin is the caller's frame.
    pub fn here(budget: usize) -> Self {
        Self {
            origin: position(),
            budget,
        }
    }

    /// Whether the current frame is further than the budget from the origin.
    pub fn exceeded(&self) -> bool {
        position().abs_diff(self.origin) > self.budget
    }
}

/// Per-engine stack state. The origin is set by the outermost entry and
/// cleared when it returns.
#[derive(Debug)]
pub(crate) struct StackGuard {
    origin: Cell<Option<usize>>,
    budget: Cell<usize>,
}

impl StackGuard {
    pub(crate) fn new(budget: usize) -> Self {
        Self {
            origin: Cell::new(None),
            budget: Cell::new(budget),
        }
    }

    pub(crate) fn set_budget(&self, budget: usize) {
        self.budget.set(budget);
    }

    /// Run `f`, recording the origin first if no entry is active.
    pub(crate) fn enter<T>(&self, f: impl FnOnce() -> T) -> T {
        if self.origin.get().is_some() {
            return f();
        }
        self.origin.set(Some(position()));
        let result = f();
        self.origin.set(None);
        result
    }

    /// The limit in effect for the current entry.
    pub(crate) fn limit(&self) -> StackLimit {
        match self.origin.get() {
            Some(origin) => StackLimit {
                origin,
                budget: self.budget.get(),
            },
            None => StackLimit::here(self.budget.get()),
        }
    }

    pub(crate) fn exceeded(&self) -> bool {
        self.limit().exceeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descend(limit: &StackLimit, depth: usize) -> usize {
        let padding = std::hint::black_box([0u8; 512]);
        if limit.exceeded() {
            return depth;
        }
        descend(limit, depth + 1) + (padding[0] as usize)
    }

    #[test]
    fn test_limit_trips_before_overflow() {
        let limit = StackLimit::here(64 * 1024);
        let depth = descend(&limit, 0);
        assert!(depth > 0);
        assert!(depth <= 64 * 1024 / 512 + 1);
    }

    #[test]
    fn test_origin_is_cleared_after_outermost_entry() {
        let guard = StackGuard::new(DEFAULT_STACK_BUDGET);
        guard.enter(|| {
            assert!(guard.origin.get().is_some());
            guard.enter(|| assert!(!guard.exceeded()));
            assert!(guard.origin.get().is_some());
        });
        assert!(guard.origin.get().is_none());
    }
}

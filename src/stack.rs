//! Stack growth for deep evaluation.
//!
//! Non-tail recursion in user programs recurses natively, so the evaluator
//! grows its stack on demand. That keeps [`crate::MAX_EVAL_DEPTH`] reachable
//! on any thread, whatever its initial stack size.

/// Grow the stack when less than this much remains (100KB red zone)
const RED_ZONE: usize = 100 * 1024;

/// Size of each newly allocated stack segment (1MB)
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, first moving to a fresh stack segment if the current one is
/// nearly exhausted.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// WASM manages its own stack
#[inline]
#[cfg(target_arch = "wasm32")]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

//! Panic hook registration. This crate never
//! installs a `#[panic_handler]` itself — that belongs to the final
//! kernel binary — but gives it a place to register a callback run
//! just before the real handler halts or resets, so an embedder can
//! attempt an emergency rollback instead of losing all connection
//! state. Wired up with the same `lazy_static` + `spin::Mutex`
//! singleton pattern as [`crate::context::CONTEXT`].
use lazy_static::lazy_static;
use spin::Mutex;

pub type PanicHookFn = fn(&core::panic::PanicInfo);

lazy_static! {
    static ref PANIC_HOOK: Mutex<Option<PanicHookFn>> = Mutex::new(None);
}

/// Register the function to run from the embedder's panic handler.
/// Overwrites any previously registered hook.
pub fn register_panic_hook(hook: PanicHookFn) {
    *PANIC_HOOK.lock() = Some(hook);
}

pub fn clear_panic_hook() {
    *PANIC_HOOK.lock() = None;
}

/// Invoke the registered hook, if any. Called by the embedder's own
/// `#[panic_handler]`; a no-op if nothing was registered.
pub fn run_panic_hook(info: &core::panic::PanicInfo) {
    if let Some(hook) = *PANIC_HOOK.lock() {
        hook(info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicBool, Ordering};

    static CALLED: AtomicBool = AtomicBool::new(false);

    fn hook(_info: &core::panic::PanicInfo) {
        CALLED.store(true, Ordering::SeqCst);
    }

    #[test]
    fn unregistered_hook_is_a_no_op() {
        clear_panic_hook();
        // Can't construct a PanicInfo in stable std test code directly,
        // so just confirm the slot really is empty.
        assert!(PANIC_HOOK.lock().is_none());
    }

    #[test]
    fn registration_round_trips() {
        register_panic_hook(hook);
        assert!(PANIC_HOOK.lock().is_some());
        clear_panic_hook();
        assert!(PANIC_HOOK.lock().is_none());
    }
}

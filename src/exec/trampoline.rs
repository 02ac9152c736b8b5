//! The hotswap trampoline contract, grounded in `hotswap.hpp`: a small
//! position-independent routine, copied to a fixed scratch address,
//! that copies the new kernel image over the running one and then
//! jumps to its entry point. Never returns.
//!
//! The actual machine code belongs to the platform, not this crate:
//! this trait is the seam an embedder plugs a real implementation into.
pub trait Trampoline {
    /// Copy `segment` to `physical_base`, optionally zero bytes between
    /// the end of the new image and `zero_until`, optionally stash
    /// `rollback_blob` for `rollback::rollback_now` to use after the
    /// jump, and then transfer control to `entry_point`. Must not
    /// return: the old kernel's stack and code are being overwritten
    /// out from under the caller as this runs.
    fn hotswap(
        &mut self,
        physical_base: usize,
        segment: &[u8],
        entry_point: usize,
        rollback_blob: Option<&[u8]>,
        zero_until: Option<usize>,
    ) -> !;
}

/// Disables/enables interrupts around the parts of `exec`/`resume`
/// that must not be preempted, grounded in the
/// `x86_64::instructions::interrupts::without_interrupts` idiom used
/// throughout this kernel's own `graphics.rs`/`vga.rs`.
pub trait InterruptControl {
    fn without_interrupts<F: FnOnce() -> R, R>(&self, f: F) -> R;

    fn enable(&self);
    fn disable(&self);
}

/// Default implementation for `x86_64`-based targets.
pub struct X86InterruptControl;

impl InterruptControl for X86InterruptControl {
    fn without_interrupts<F: FnOnce() -> R, R>(&self, f: F) -> R {
        x86_64::instructions::interrupts::without_interrupts(f)
    }

    fn enable(&self) {
        x86_64::instructions::interrupts::enable();
    }

    fn disable(&self) {
        x86_64::instructions::interrupts::disable();
    }
}

//! ELF scanning, the hotswap trampoline contract, and the update
//! executor.
pub mod elf;
pub mod executor;
pub mod trampoline;

pub use executor::{exec, prepare, DeviceControl, NullDeviceControl};
pub use trampoline::{InterruptControl, Trampoline, X86InterruptControl};

//! Configuration flags.

/// Behavior toggles for the storage region and the update executor.
///
/// `rollback.cpp` and `update.cpp` keep these as file-scope `bool`s
/// (`LIVEUPDATE_USE_CHEKSUMS`, `LIVEUPDATE_ZERO_OLD_MEMORY`,
/// `LIVEUPDATE_EXTRA_CHECKS`). They're fields here instead, so a
/// [`crate::context::LiveUpdateContext`] is constructible with any
/// combination in tests without touching global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Compute and validate header/partition CRC32s. Default on.
    pub use_checksums: bool,
    /// Zero memory between the new image's end and the old heap end
    /// during the trampoline copy. Default off.
    pub zero_old_memory: bool,
    /// Checksum per-entry payloads in addition to header/partition CRCs.
    /// Default off: this scales poorly with large buffers/vectors.
    pub extra_checks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            use_checksums: true,
            zero_old_memory: false,
            extra_checks: false,
        }
    }
}

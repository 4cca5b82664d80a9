//! Opaque decode-engine module handle.

use core::fmt;

/// Token identifying one loaded module inside a decode engine.
///
/// The value means nothing outside the engine that issued it. Sessions keep
/// an `Option<ModuleHandle>`; `None` is the cleared state after destroy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleHandle(u64);

impl ModuleHandle {
    /// Wrap a raw engine token.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw engine token.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{:x}", self.0)
    }
}

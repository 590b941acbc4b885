//! selfguard - keep child processes from killing their parent.
//!
//! `install_self_protection()` attaches a seccomp filter that makes
//! kill(2), tkill(2) and tgkill(2) fail with EPERM whenever they target this
//! process's pid or its process group (-pid). Every other syscall, and every
//! signal aimed at any other process, is untouched. The filter is inherited
//! by all descendants and cannot be removed, so call it once, early, before
//! spawning anything that runs untrusted commands.
//!
//! Supported: Linux on x86_64, aarch64 and riscv64. Anywhere else the call
//! succeeds with [`Protection::Unavailable`] and nothing is enforced.

use std::fmt;

pub mod arch;
pub mod bpf;
pub mod error;
pub mod filter;
pub mod guard;

#[cfg(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
))]
pub mod install;

#[cfg(any(
    test,
    not(all(
        target_os = "linux",
        any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
    ))
))]
mod noop;

pub use error::{Error, ErrorKind, Result};
pub use guard::StartupGuard;

/// Outcome of a successful `install_self_protection()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    /// The kernel now refuses guarded signals aimed at `pid` or `-pid`.
    Enforced { pid: u32, arch: &'static str },
    /// No kill-guard on this platform. Nothing changed.
    Unavailable,
}

impl Protection {
    pub fn is_enforced(&self) -> bool {
        matches!(self, Protection::Enforced { .. })
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protection::Enforced { pid, arch } => {
                write!(f, "enforced for pid {} ({})", pid, arch)
            }
            Protection::Unavailable => write!(f, "unavailable (not enforced)"),
        }
    }
}

/// Whether this build can enforce the kill-guard at all.
pub fn is_supported() -> bool {
    arch::native().is_some()
}

/// Install the kill-guard for the current process.
///
/// Must run once, before the first subprocess is spawned. A second call is
/// unsupported; hosts that cannot rule it out should go through
/// [`StartupGuard`]. On error the process must be treated as unprotected.
#[cfg(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
))]
pub fn install_self_protection() -> Result<Protection> {
    install::install_self_protection(arch::HOST)
}

/// Install the kill-guard for the current process.
///
/// This target has no seccomp kill-guard: the call always succeeds with
/// [`Protection::Unavailable`] and child processes can still signal us.
#[cfg(not(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
)))]
pub fn install_self_protection() -> Result<Protection> {
    noop::install_self_protection()
}

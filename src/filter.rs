//! Kill-guard decision program.
//!
//! Denies kill/tkill/tgkill with EPERM when the first argument names this
//! process (`pid`) or its process group (`-pid`). Everything else, including
//! any syscall made under a foreign audit arch, is allowed.
//!
//! Only arg0 is compared. For tgkill that is the thread group id, for tkill
//! the target tid (which equals the pid for the main thread only). Other
//! threads of this process are reachable through tkill by tid.
//!
//! Only native syscall numbers are matched. On x86_64 kernels built with
//! CONFIG_X86_X32_ABI, kill issued as `0x40000000 | nr` under the same audit
//! arch is not caught.

use serde::Serialize;

use crate::arch::{self, ArchTable};

/// This process's id as the filter sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessIdentity {
    pub pid: u32,
    /// Two's complement of `pid`, the bit pattern of kill(-pid, ...)
    pub group: u32,
}

impl ProcessIdentity {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            group: (pid as i32).wrapping_neg() as u32,
        }
    }

    /// Identity of the running process.
    #[cfg(all(
        target_os = "linux",
        any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
    ))]
    pub fn current() -> Self {
        Self::new(nix::unistd::getpid().as_raw() as u32)
    }

    pub fn matches(&self, target: u32) -> bool {
        target == self.pid || target == self.group
    }
}

/// 4-byte words of `struct seccomp_data` the program reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Nr,
    Arch,
    /// Low 32 bits of argument n
    ArgLow(u8),
}

impl Field {
    /// Byte offset into `struct seccomp_data`.
    pub fn offset(self) -> u32 {
        match self {
            Field::Nr => 0,
            Field::Arch => 4,
            // args[] starts at 16, u64 each; low word first on LE targets
            Field::ArgLow(n) => 16 + 8 * n as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    DenyWithPermissionError,
}

/// One node of the decision program. Jumps are forward only, relative to
/// the following instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    Load(Field),
    JumpIfEqual { value: u32, on_true: u8, on_false: u8 },
    Return(Verdict),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterProgram {
    pub arch: &'static str,
    pub audit_arch: u32,
    pub identity: ProcessIdentity,
    pub instructions: Vec<Instruction>,
}

/// Build the kill-guard for `pid` on the native architecture.
///
/// Returns `None` where there is no syscall table for the build target.
pub fn build(pid: u32) -> Option<FilterProgram> {
    arch::native().map(|table| build_for(table, pid))
}

/// Build the kill-guard for `pid` against an explicit syscall table.
pub fn build_for(table: &ArchTable, pid: u32) -> FilterProgram {
    use Instruction::*;

    let identity = ProcessIdentity::new(pid);

    //  0  ld  arch
    //  1  jeq native     -> 2 : 11
    //  2  ld  nr
    //  3  jeq kill       -> 6 : 4
    //  4  jeq tkill      -> 6 : 5
    //  5  jeq tgkill     -> 6 : 11
    //  6  ld  arg0
    //  7  jeq pid        -> 10 : 8
    //  8  jeq -pid       -> 10 : 9
    //  9  ret allow
    // 10  ret eperm
    // 11  ret allow
    let instructions = vec![
        Load(Field::Arch),
        JumpIfEqual { value: table.audit_arch, on_true: 0, on_false: 9 },
        Load(Field::Nr),
        JumpIfEqual { value: table.kill, on_true: 2, on_false: 0 },
        JumpIfEqual { value: table.tkill, on_true: 1, on_false: 0 },
        JumpIfEqual { value: table.tgkill, on_true: 0, on_false: 5 },
        Load(Field::ArgLow(0)),
        JumpIfEqual { value: identity.pid, on_true: 2, on_false: 0 },
        JumpIfEqual { value: identity.group, on_true: 1, on_false: 0 },
        Return(Verdict::Allow),
        Return(Verdict::DenyWithPermissionError),
        Return(Verdict::Allow),
    ];

    FilterProgram {
        arch: table.name,
        audit_arch: table.audit_arch,
        identity,
        instructions,
    }
}

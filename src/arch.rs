//! Per-architecture syscall numbers for the guarded signal syscalls.
//!
//! Numbers come from the kernel's own tables:
//!   x86_64   arch/x86/entry/syscalls/syscall_64.tbl
//!   aarch64  include/uapi/asm-generic/unistd.h
//!   riscv64  include/uapi/asm-generic/unistd.h
//!
//! A wrong number here does not fail loudly: the filter simply stops
//! matching. Check against the tables above before touching anything.

/// Audit architecture tags (linux/audit.h): EM_* | __AUDIT_ARCH_64BIT | __AUDIT_ARCH_LE
pub const AUDIT_ARCH_X86_64: u32 = 0xc000003e;
pub const AUDIT_ARCH_AARCH64: u32 = 0xc00000b7;
pub const AUDIT_ARCH_RISCV64: u32 = 0xc00000f3;

/// Syscall numbers and audit tag for one ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchTable {
    pub name: &'static str,
    pub audit_arch: u32,
    /// kill(pid, sig)
    pub kill: u32,
    /// tkill(tid, sig)
    pub tkill: u32,
    /// tgkill(tgid, tid, sig)
    pub tgkill: u32,
}

impl ArchTable {
    /// The guarded syscalls, in the order the filter tests them.
    pub fn guarded(&self) -> [u32; 3] {
        [self.kill, self.tkill, self.tgkill]
    }
}

pub const X86_64: ArchTable = ArchTable {
    name: "x86_64",
    audit_arch: AUDIT_ARCH_X86_64,
    kill: 62,
    tkill: 200,
    tgkill: 234,
};

pub const AARCH64: ArchTable = ArchTable {
    name: "aarch64",
    audit_arch: AUDIT_ARCH_AARCH64,
    kill: 129,
    tkill: 130,
    tgkill: 131,
};

pub const RISCV64: ArchTable = ArchTable {
    name: "riscv64",
    audit_arch: AUDIT_ARCH_RISCV64,
    kill: 129,
    tkill: 130,
    tgkill: 131,
};

/// Table of the build target. Only exists where the kill-guard is supported.
#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
pub const HOST: &ArchTable = &X86_64;

#[cfg(all(target_os = "linux", target_arch = "aarch64"))]
pub const HOST: &ArchTable = &AARCH64;

#[cfg(all(target_os = "linux", target_arch = "riscv64"))]
pub const HOST: &ArchTable = &RISCV64;

#[cfg(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
))]
const NATIVE: Option<&ArchTable> = Some(HOST);

#[cfg(not(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
)))]
const NATIVE: Option<&ArchTable> = None;

/// Table for the build target, if the kill-guard is supported there.
pub const fn native() -> Option<&'static ArchTable> {
    NATIVE
}

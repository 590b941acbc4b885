//! Classic BPF encoding of the kill-guard program.
//!
//! `encode` emits the exact `struct sock_filter` words the kernel consumes.
//! `validate` applies the same structural rules as the kernel's filter
//! checker, and `simulate` runs an encoded program against a synthetic
//! `seccomp_data` so the words can be checked before they are attached.
//! Enforcement is the kernel's job; nothing here stands in for it.

use serde::Serialize;

use crate::arch::ArchTable;
use crate::error::{Error, Result};
use crate::filter::{FilterProgram, Instruction, Verdict};

// BPF instruction encoding
pub const BPF_LD: u16 = 0x00;
pub const BPF_JMP: u16 = 0x05;
pub const BPF_RET: u16 = 0x06;
pub const BPF_W: u16 = 0x00;
pub const BPF_ABS: u16 = 0x20;
pub const BPF_JEQ: u16 = 0x10;
pub const BPF_K: u16 = 0x00;

// seccomp return values
pub const SECCOMP_RET_ALLOW: u32 = 0x7fff0000;
pub const SECCOMP_RET_ERRNO: u32 = 0x00050000;

/// Kernel limit on filter length (BPF_MAXINSNS)
pub const BPF_MAXINSNS: usize = 4096;

/// `sizeof(struct seccomp_data)`
const SECCOMP_DATA_LEN: u32 = 64;

const LD_W_ABS: u16 = BPF_LD | BPF_W | BPF_ABS;
const JEQ_K: u16 = BPF_JMP | BPF_JEQ | BPF_K;
const RET_K: u16 = BPF_RET | BPF_K;

/// `struct sock_filter` from linux/filter.h
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SockFilter {
    pub code: u16,
    pub jt: u8,
    pub jf: u8,
    pub k: u32,
}

pub const fn bpf_stmt(code: u16, k: u32) -> SockFilter {
    SockFilter { code, jt: 0, jf: 0, k }
}

pub const fn bpf_jump(code: u16, k: u32, jt: u8, jf: u8) -> SockFilter {
    SockFilter { code, jt, jf, k }
}

fn ret_value(verdict: Verdict) -> u32 {
    match verdict {
        Verdict::Allow => SECCOMP_RET_ALLOW,
        Verdict::DenyWithPermissionError => SECCOMP_RET_ERRNO | libc::EPERM as u32,
    }
}

/// Encode the decision program into kernel BPF words.
pub fn encode(program: &FilterProgram) -> Vec<SockFilter> {
    program
        .instructions
        .iter()
        .map(|insn| match *insn {
            Instruction::Load(field) => bpf_stmt(LD_W_ABS, field.offset()),
            Instruction::JumpIfEqual { value, on_true, on_false } => {
                bpf_jump(JEQ_K, value, on_true, on_false)
            }
            Instruction::Return(verdict) => bpf_stmt(RET_K, ret_value(verdict)),
        })
        .collect()
}

/// Structural checks the kernel would apply, restricted to the opcodes
/// this crate emits.
pub fn validate(filter: &[SockFilter]) -> Result<()> {
    if filter.is_empty() {
        return Err(Error::InvalidProgram("empty program".into()));
    }
    if filter.len() > BPF_MAXINSNS {
        return Err(Error::InvalidProgram(format!(
            "{} instructions exceeds the limit of {}",
            filter.len(),
            BPF_MAXINSNS
        )));
    }

    for (pc, insn) in filter.iter().enumerate() {
        match insn.code {
            LD_W_ABS => {
                if insn.k % 4 != 0 || insn.k > SECCOMP_DATA_LEN - 4 {
                    return Err(Error::InvalidProgram(format!(
                        "insn {pc}: load offset {} outside seccomp_data",
                        insn.k
                    )));
                }
            }
            JEQ_K => {
                let last = pc + 1 + insn.jt.max(insn.jf) as usize;
                if last >= filter.len() {
                    return Err(Error::InvalidProgram(format!(
                        "insn {pc}: jump past end of program"
                    )));
                }
            }
            RET_K => {}
            code => {
                return Err(Error::InvalidProgram(format!(
                    "insn {pc}: unsupported opcode {code:#06x}"
                )));
            }
        }
    }

    if filter[filter.len() - 1].code != RET_K {
        return Err(Error::InvalidProgram("program does not end in a return".into()));
    }
    Ok(())
}

/// `struct seccomp_data` as seen by a filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeccompData {
    pub nr: i32,
    pub arch: u32,
    pub instruction_pointer: u64,
    pub args: [u64; 6],
}

impl SeccompData {
    pub fn syscall(table: &ArchTable, nr: u32, arg0: u64) -> Self {
        let mut args = [0; 6];
        args[0] = arg0;
        Self {
            nr: nr as i32,
            arch: table.audit_arch,
            instruction_pointer: 0,
            args,
        }
    }

    fn word(&self, offset: u32) -> Option<u32> {
        let mut bytes = [0u8; SECCOMP_DATA_LEN as usize];
        bytes[0..4].copy_from_slice(&self.nr.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.arch.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.instruction_pointer.to_le_bytes());
        for (i, arg) in self.args.iter().enumerate() {
            let at = 16 + 8 * i;
            bytes[at..at + 8].copy_from_slice(&arg.to_le_bytes());
        }
        let at = offset as usize;
        let word = bytes.get(at..at + 4)?;
        Some(u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
    }
}

/// Run an encoded program and return the raw seccomp return value.
pub fn simulate(filter: &[SockFilter], data: &SeccompData) -> Result<u32> {
    let mut acc: u32 = 0;
    let mut pc = 0usize;

    // Jumps are forward only, so each step strictly increases pc.
    while let Some(insn) = filter.get(pc) {
        match insn.code {
            LD_W_ABS => {
                acc = data.word(insn.k).ok_or_else(|| {
                    Error::InvalidProgram(format!("insn {pc}: bad load offset {}", insn.k))
                })?;
                pc += 1;
            }
            JEQ_K => {
                let skip = if acc == insn.k { insn.jt } else { insn.jf };
                pc += 1 + skip as usize;
            }
            RET_K => return Ok(insn.k),
            code => {
                return Err(Error::InvalidProgram(format!(
                    "insn {pc}: unsupported opcode {code:#06x}"
                )))
            }
        }
    }
    Err(Error::InvalidProgram("fell off the end of the program".into()))
}

/// Decode a seccomp return value produced by this crate's programs.
pub fn verdict(ret: u32) -> Option<Verdict> {
    if ret == SECCOMP_RET_ALLOW {
        Some(Verdict::Allow)
    } else if ret == SECCOMP_RET_ERRNO | libc::EPERM as u32 {
        Some(Verdict::DenyWithPermissionError)
    } else {
        None
    }
}

/// Run the encoded program on the cases it exists for before it goes
/// anywhere near the kernel.
pub fn self_check(program: &FilterProgram, table: &ArchTable, filter: &[SockFilter]) -> Result<()> {
    validate(filter)?;

    let id = program.identity;
    let stranger = if id.pid == 1 { 2 } else { 1 };
    let deny = Verdict::DenyWithPermissionError;

    let kill_self = SeccompData::syscall(table, table.kill, id.pid as u64);
    let cases = [
        ("kill(pid)", kill_self, deny),
        ("kill(-pid)", SeccompData::syscall(table, table.kill, id.group as u64), deny),
        ("tgkill(pid)", SeccompData::syscall(table, table.tgkill, id.pid as u64), deny),
        ("kill(other)", SeccompData::syscall(table, table.kill, stranger), Verdict::Allow),
        ("foreign arch", SeccompData { arch: !table.audit_arch, ..kill_self }, Verdict::Allow),
    ];

    for (name, data, want) in cases {
        let got = verdict(simulate(filter, &data)?);
        if got != Some(want) {
            return Err(Error::InvalidProgram(format!(
                "self-check {name}: expected {want:?}, got {got:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{AARCH64, RISCV64, X86_64};
    use crate::filter::build_for;

    fn run(table: &ArchTable, pid: u32, data: SeccompData) -> Verdict {
        let filter = encode(&build_for(table, pid));
        verdict(simulate(&filter, &data).unwrap()).unwrap()
    }

    #[test]
    fn test_sock_filter_layout() {
        assert_eq!(std::mem::size_of::<SockFilter>(), 8);
        assert_eq!(std::mem::align_of::<SockFilter>(), 4);
    }

    #[test]
    fn test_encoding_matches_kernel_words() {
        let filter = encode(&build_for(&X86_64, 4242));
        assert_eq!(filter.len(), 12);
        assert_eq!(filter[0], bpf_stmt(0x20, 4));
        assert_eq!(filter[1], bpf_jump(0x15, 0xc000003e, 0, 9));
        assert_eq!(filter[2], bpf_stmt(0x20, 0));
        assert_eq!(filter[3], bpf_jump(0x15, 62, 2, 0));
        assert_eq!(filter[4], bpf_jump(0x15, 200, 1, 0));
        assert_eq!(filter[5], bpf_jump(0x15, 234, 0, 5));
        assert_eq!(filter[6], bpf_stmt(0x20, 16));
        assert_eq!(filter[7], bpf_jump(0x15, 4242, 2, 0));
        assert_eq!(filter[8], bpf_jump(0x15, 0xffffef6e, 1, 0));
        assert_eq!(filter[9], bpf_stmt(0x06, 0x7fff0000));
        assert_eq!(filter[10], bpf_stmt(0x06, 0x00050001));
        assert_eq!(filter[11], bpf_stmt(0x06, 0x7fff0000));
    }

    #[test]
    fn test_denies_self_and_group() {
        for table in [X86_64, AARCH64, RISCV64] {
            for nr in table.guarded() {
                let pid_call = SeccompData::syscall(&table, nr, 4242);
                let group_call = SeccompData::syscall(&table, nr, (-4242i64) as u64);
                assert_eq!(run(&table, 4242, pid_call), Verdict::DenyWithPermissionError);
                assert_eq!(run(&table, 4242, group_call), Verdict::DenyWithPermissionError);
            }
        }
    }

    #[test]
    fn test_only_low_word_of_arg0_is_compared() {
        // pid_t is 32 bits; the kernel ignores the upper half.
        let data = SeccompData::syscall(&X86_64, X86_64.kill, 0xdead_beef_0000_1092);
        assert_eq!(run(&X86_64, 4242, data), Verdict::DenyWithPermissionError);
    }

    #[test]
    fn test_allows_other_targets() {
        for target in [0u64, 1, 4241, 4243, 9001, (-1i64) as u64, (-9001i64) as u64] {
            let data = SeccompData::syscall(&X86_64, X86_64.kill, target);
            assert_eq!(run(&X86_64, 4242, data), Verdict::Allow, "target {target}");
        }
    }

    #[test]
    fn test_allows_unguarded_syscalls_aimed_at_self() {
        // getpid, wait4, ptrace, pidfd_send_signal with arg0 == pid
        for nr in [39u32, 61, 101, 424] {
            let data = SeccompData::syscall(&X86_64, nr, 4242);
            assert_eq!(run(&X86_64, 4242, data), Verdict::Allow, "nr {nr}");
        }
    }

    #[test]
    fn test_x32_numbers_are_not_matched() {
        // __X32_SYSCALL_BIT | nr under AUDIT_ARCH_X86_64 falls through.
        for nr in X86_64.guarded() {
            let data = SeccompData::syscall(&X86_64, 0x4000_0000 | nr, 4242);
            assert_eq!(run(&X86_64, 4242, data), Verdict::Allow, "nr {nr:#x}");
        }
    }

    #[test]
    fn test_foreign_arch_is_always_allowed() {
        // i386 kill is 37; x86_64 numbers under the i386 tag must not match either.
        const AUDIT_ARCH_I386: u32 = 0x40000003;
        for nr in [37u32, 62, 200, 234] {
            let data = SeccompData {
                arch: AUDIT_ARCH_I386,
                ..SeccompData::syscall(&X86_64, nr, 4242)
            };
            assert_eq!(run(&X86_64, 4242, data), Verdict::Allow, "nr {nr}");
        }
        let data = SeccompData {
            arch: X86_64.audit_arch,
            ..SeccompData::syscall(&AARCH64, AARCH64.kill, 4242)
        };
        assert_eq!(run(&AARCH64, 4242, data), Verdict::Allow);
    }

    #[test]
    fn test_tgkill_checks_tgid_not_tid() {
        let mut data = SeccompData::syscall(&X86_64, X86_64.tgkill, 555);
        data.args[1] = 4242;
        assert_eq!(run(&X86_64, 4242, data), Verdict::Allow);
    }

    #[test]
    fn test_validate_rejects_malformed() {
        assert!(validate(&[]).is_err());
        assert!(validate(&[bpf_jump(JEQ_K, 1, 0, 3), bpf_stmt(RET_K, 0)]).is_err());
        assert!(validate(&[bpf_stmt(LD_W_ABS, 64), bpf_stmt(RET_K, 0)]).is_err());
        assert!(validate(&[bpf_stmt(LD_W_ABS, 2), bpf_stmt(RET_K, 0)]).is_err());
        assert!(validate(&[bpf_stmt(LD_W_ABS, 0)]).is_err());
        assert!(validate(&[bpf_stmt(0x04, 0), bpf_stmt(RET_K, 0)]).is_err());
        assert!(validate(&vec![bpf_stmt(RET_K, 0); BPF_MAXINSNS + 1]).is_err());
        assert!(validate(&[bpf_stmt(RET_K, SECCOMP_RET_ALLOW)]).is_ok());
    }

    #[test]
    fn test_validate_accepts_built_programs() {
        for table in [X86_64, AARCH64, RISCV64] {
            validate(&encode(&build_for(&table, 12345))).unwrap();
        }
    }

    #[test]
    fn test_self_check_passes_for_built_program() {
        for pid in [1u32, 2, 4242, 4_194_304] {
            let program = build_for(&X86_64, pid);
            self_check(&program, &X86_64, &encode(&program)).unwrap();
        }
    }

    #[test]
    fn test_self_check_catches_wrong_table() {
        let program = build_for(&AARCH64, 4242);
        let err = self_check(&program, &X86_64, &encode(&program)).unwrap_err();
        assert!(matches!(err, Error::InvalidProgram(_)));
    }

    #[test]
    fn test_self_check_catches_bad_jump_target() {
        let program = build_for(&X86_64, 4242);
        let mut filter = encode(&program);
        // Send matches on kill to the allow at 9 instead of the pid checks.
        filter[3].jt = 5;
        let err = self_check(&program, &X86_64, &filter).unwrap_err();
        assert!(err.to_string().contains("self-check kill(pid)"));
    }
}

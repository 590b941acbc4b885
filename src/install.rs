//! Attach the kill-guard to the running process.
//!
//! prctl(PR_SET_NO_NEW_PRIVS) then seccomp(SECCOMP_SET_MODE_FILTER) with
//! SECCOMP_FILTER_FLAG_TSYNC, so every thread of the process gets the
//! filter, not just the caller. Both transitions are irreversible and are
//! inherited across fork and execve.

use log::{debug, info};
use nix::errno::Errno;

use crate::arch::ArchTable;
use crate::bpf::{self, SockFilter};
use crate::error::{Error, Result};
use crate::filter::{self, ProcessIdentity};
use crate::Protection;

// linux/seccomp.h
const SECCOMP_SET_MODE_FILTER: libc::c_uint = 1;
const SECCOMP_FILTER_FLAG_TSYNC: libc::c_ulong = 1;

/// `struct sock_fprog` from linux/filter.h
#[repr(C)]
struct SockFprog {
    len: u16,
    filter: *const SockFilter,
}

pub(crate) fn install_self_protection(table: &'static ArchTable) -> Result<Protection> {
    let identity = ProcessIdentity::current();
    let program = filter::build_for(table, identity.pid);
    let words = bpf::encode(&program);
    debug!(
        "[seccomp] kill-guard for pid {} (group {:#010x}) on {}: {} instructions",
        identity.pid,
        identity.group,
        table.name,
        words.len()
    );

    bpf::self_check(&program, table, &words)?;
    attach(&words)?;

    info!(
        "[seccomp] kill-guard active: kill/tkill/tgkill against {} or -{} now fail with EPERM",
        identity.pid, identity.pid
    );
    Ok(Protection::Enforced {
        pid: identity.pid,
        arch: table.name,
    })
}

/// Set no_new_privs and attach `words` to every thread of this process.
pub fn attach(words: &[SockFilter]) -> Result<()> {
    bpf::validate(words)?;
    let len = u16::try_from(words.len())
        .map_err(|_| Error::InvalidProgram(format!("{} instructions", words.len())))?;

    nix::sys::prctl::set_no_new_privs().map_err(Error::NoNewPrivs)?;
    debug!("[seccomp] prctl: no_new_privs");

    let prog = SockFprog {
        len,
        filter: words.as_ptr(),
    };

    // SAFETY: prog points at `len` initialized sock_filter words that outlive
    // the call; the kernel copies the program before returning.
    let rc = unsafe {
        libc::syscall(
            libc::SYS_seccomp,
            SECCOMP_SET_MODE_FILTER,
            SECCOMP_FILTER_FLAG_TSYNC,
            &prog as *const SockFprog,
        )
    };

    classify(rc, Errno::last())
}

/// Map the seccomp(2) return value. With TSYNC a positive return is the id
/// of a thread that could not be moved onto the new filter.
fn classify(rc: libc::c_long, errno: Errno) -> Result<()> {
    match rc {
        0 => Ok(()),
        tid if tid > 0 => Err(Error::ThreadSync { tid: tid as i64 }),
        _ => Err(Error::Attach(errno)),
    }
}

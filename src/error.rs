#[cfg(all(
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
))]
use nix::errno::Errno;

/// Kill-guard installation errors.
#[derive(Debug, thiserror::Error, displaydoc::Display)]
pub enum Error {
    /// prctl(PR_SET_NO_NEW_PRIVS) failed: {0}
    #[cfg(all(
        target_os = "linux",
        any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
    ))]
    NoNewPrivs(Errno),
    /// seccomp(SECCOMP_SET_MODE_FILTER, TSYNC) failed: {0}
    #[cfg(all(
        target_os = "linux",
        any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
    ))]
    Attach(Errno),
    /// seccomp TSYNC could not synchronize thread {tid}
    ThreadSync { tid: i64 },
    /// filter program rejected before install: {0}
    InvalidProgram(String),
    /// kill-guard installation already attempted by this start-up sequence
    AlreadyInstalled,
}

/// Coarse failure class, for callers that only decide log-or-abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The no-new-privileges transition was refused.
    PrivilegeFlag,
    /// The filter could not be attached; the process is unprotected.
    Install,
    /// The caller broke the call-once contract.
    Usage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            #[cfg(all(
                target_os = "linux",
                any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
            ))]
            Error::NoNewPrivs(_) => ErrorKind::PrivilegeFlag,
            #[cfg(all(
                target_os = "linux",
                any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
            ))]
            Error::Attach(_) => ErrorKind::Install,
            Error::ThreadSync { .. } | Error::InvalidProgram(_) => ErrorKind::Install,
            Error::AlreadyInstalled => ErrorKind::Usage,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(all(
        target_os = "linux",
        any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
    ))]
    #[test]
    fn test_display_carries_errno() {
        let err = Error::NoNewPrivs(Errno::EINVAL);
        assert!(err.to_string().contains("PR_SET_NO_NEW_PRIVS"));
        assert!(err.to_string().contains("EINVAL"));
    }

    #[cfg(all(
        target_os = "linux",
        any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "riscv64")
    ))]
    #[test]
    fn test_errno_kinds() {
        assert_eq!(Error::NoNewPrivs(Errno::EPERM).kind(), ErrorKind::PrivilegeFlag);
        assert_eq!(Error::Attach(Errno::EFAULT).kind(), ErrorKind::Install);
    }

    #[test]
    fn test_thread_sync_display() {
        let err = Error::ThreadSync { tid: 77 };
        assert_eq!(err.to_string(), "seccomp TSYNC could not synchronize thread 77");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Error::ThreadSync { tid: 3 }.kind(), ErrorKind::Install);
        assert_eq!(Error::InvalidProgram("x".into()).kind(), ErrorKind::Install);
        assert_eq!(Error::AlreadyInstalled.kind(), ErrorKind::Usage);
    }
}

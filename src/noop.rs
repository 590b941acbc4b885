//! Stand-in for targets without a seccomp kill-guard.
//!
//! Reports success so start-up proceeds, but as `Protection::Unavailable`:
//! children of this process can still signal it.

use log::warn;

use crate::error::Result;
use crate::Protection;

pub(crate) fn install_self_protection() -> Result<Protection> {
    warn!(
        "[seccomp] kill-guard not supported on {}/{}; this process is NOT protected",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    Ok(Protection::Unavailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_reports_unavailable() {
        let protection = install_self_protection().unwrap();
        assert_eq!(protection, Protection::Unavailable);
        assert!(!protection.is_enforced());
    }
}

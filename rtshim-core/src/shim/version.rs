//! Shim / consumer compatibility contract.
//!
//! Checked once during setup, never from the audio thread. A consumer built
//! against a different layout of the shim state must not start a stream.

use crate::error::{Result, ShimError};

/// Version of the shim state layout and callback contract.
pub const SHIM_VERSION: u32 = 3;

/// The version this build of the shim speaks.
pub const fn version() -> u32 {
    SHIM_VERSION
}

/// Fail unless `found` (the consumer's expected version) matches this shim.
pub fn ensure_compatible(found: u32) -> Result<()> {
    if found == SHIM_VERSION {
        Ok(())
    } else {
        Err(ShimError::VersionMismatch {
            expected: SHIM_VERSION,
            found,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_version_is_accepted() {
        assert!(ensure_compatible(version()).is_ok());
    }

    #[test]
    fn mismatch_is_reported_with_both_versions() {
        let err = ensure_compatible(2).unwrap_err();
        assert!(matches!(
            err,
            ShimError::VersionMismatch {
                expected: SHIM_VERSION,
                found: 2
            }
        ));
        assert_eq!(
            err.to_string(),
            "shim version mismatch: shim speaks v3, consumer expects v2"
        );
    }
}

//! Shared configuration-validation helpers and the fatal `ConfigError`.
//!
//! Every binary validates its CLI flags before spawning any thread (spec.md
//! §7, taxonomy item 1: configuration errors are fatal at init). On error,
//! `main` logs and exits non-zero per spec.md §6.4.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a power of two, got {value}")]
    NotPowerOfTwo { name: &'static str, value: u64 },

    #[error("{name} must be in range [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("descriptor region too small: need at least {needed} bytes, got {actual}")]
    DescriptorRegionTooSmall { needed: usize, actual: usize },
}

pub fn require_power_of_two(name: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value & (value - 1) != 0 {
        return Err(ConfigError::NotPowerOfTwo { name, value });
    }
    Ok(())
}

pub fn require_range(name: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Exit the process with a non-zero code after logging a fatal configuration
/// error, matching spec.md §6.4's "non-zero on misconfiguration" contract.
pub fn fatal(err: ConfigError) -> ! {
    tracing::error!("configuration error: {err}");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_of_two_accepts_and_rejects() {
        assert!(require_power_of_two("x", 1).is_ok());
        assert!(require_power_of_two("x", 1024).is_ok());
        assert!(require_power_of_two("x", 0).is_err());
        assert!(require_power_of_two("x", 3).is_err());
    }

    #[test]
    fn range_check() {
        assert!(require_range("cru-count", 1, 1, 32).is_ok());
        assert!(require_range("cru-count", 32, 1, 32).is_ok());
        assert!(require_range("cru-count", 0, 1, 32).is_err());
        assert!(require_range("cru-count", 33, 1, 32).is_err());
    }
}

//! CPU mask checking.
//!
//! The validator consults a [`CpuMaskChecker`] for any non-empty
//! `spec.dataEngineSpec.v2.cpuMask`. [`HostCpuMaskChecker`] is the checker the
//! webhook binary uses: it validates the mask syntax, that the mask only
//! selects CPUs the host has, and that the selected CPUs fit within the
//! guaranteed instance-manager CPU budget of the v2 data engine.

use regex::Regex;
use thiserror::Error;

/// Pattern a CPU mask must match: hex with `0x` prefix and no leading zero
const CPU_MASK_PATTERN: &str = r"^0x[1-9a-fA-F][0-9a-fA-F]*$";

/// Name of the setting bounding the CPUs a v2 instance manager may claim
pub const GUARANTEED_INSTANCE_MANAGER_CPU_SETTING: &str = "guaranteed-instance-manager-cpu";

/// Errors reported by a CPU mask checker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CpuMaskError {
    #[error("invalid CPU mask: {0}")]
    Malformed(String),

    #[error("failed to parse CPU mask {mask}: {reason}")]
    Unparsable { mask: String, reason: String },

    #[error("CPU mask exceeds the maximum allowed value {max} for the current system: {mask}")]
    ExceedsHost { max: u64, mask: String },

    #[error(
        "number of CPUs ({millis} millicpu) requested by CPU mask ({mask}) is larger than the {setting} setting value ({guaranteed} millicpu)",
        setting = GUARANTEED_INSTANCE_MANAGER_CPU_SETTING
    )]
    ExceedsGuaranteed {
        millis: u64,
        mask: String,
        guaranteed: u64,
    },

    #[error("CPU mask checker unavailable: {0}")]
    Unavailable(String),
}

/// Capability consulted by the validator to check a CPU mask.
///
/// Implementations must be cheap and synchronous, and must return in bounded
/// time. The validator stops waiting after its check timeout, but the call
/// keeps its blocking-pool thread until it returns.
pub trait CpuMaskChecker: Send + Sync {
    fn validate_cpu_mask(&self, mask: &str) -> Result<(), CpuMaskError>;
}

/// Checks CPU masks against the host CPU count and the guaranteed CPU budget.
#[derive(Clone, Debug)]
pub struct HostCpuMaskChecker {
    pattern: Regex,
    cpu_count: u32,
    guaranteed_millicpu: u64,
}

impl HostCpuMaskChecker {
    /// Create a checker for a host with `cpu_count` CPUs and a budget of
    /// `guaranteed_millicpu`.
    pub fn new(cpu_count: u32, guaranteed_millicpu: u64) -> Result<Self, CpuMaskError> {
        let pattern =
            Regex::new(CPU_MASK_PATTERN).map_err(|e| CpuMaskError::Unavailable(e.to_string()))?;
        Ok(Self {
            pattern,
            cpu_count,
            guaranteed_millicpu,
        })
    }

    /// Create a checker sized to the CPUs available to this process.
    pub fn for_current_host(guaranteed_millicpu: u64) -> Result<Self, CpuMaskError> {
        let cpu_count = std::thread::available_parallelism()
            .map_err(|e| CpuMaskError::Unavailable(e.to_string()))?
            .get();
        Self::new(
            u32::try_from(cpu_count).unwrap_or(u32::MAX),
            guaranteed_millicpu,
        )
    }

    /// Largest mask value that only selects CPUs present on the host
    pub fn max_mask_value(&self) -> u64 {
        if self.cpu_count >= u64::BITS {
            u64::MAX
        } else {
            (1u64 << self.cpu_count) - 1
        }
    }
}

impl CpuMaskChecker for HostCpuMaskChecker {
    fn validate_cpu_mask(&self, mask: &str) -> Result<(), CpuMaskError> {
        if !self.pattern.is_match(mask) {
            return Err(CpuMaskError::Malformed(mask.to_string()));
        }

        let digits = mask.trim_start_matches("0x");
        let value = u64::from_str_radix(digits, 16).map_err(|e| CpuMaskError::Unparsable {
            mask: mask.to_string(),
            reason: e.to_string(),
        })?;

        let max = self.max_mask_value();
        if value > max {
            return Err(CpuMaskError::ExceedsHost {
                max,
                mask: mask.to_string(),
            });
        }

        let millis = u64::from(value.count_ones()) * 1000;
        if millis > self.guaranteed_millicpu {
            return Err(CpuMaskError::ExceedsGuaranteed {
                millis,
                mask: mask.to_string(),
                guaranteed: self.guaranteed_millicpu,
            });
        }

        Ok(())
    }
}

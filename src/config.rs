//! Process-wide knobs, lifted into an explicit value (DESIGN NOTES §9)
//! instead of globals: strict CRC verification, the zipbomb expansion
//! guard, and its ratio/slack parameters.

/// Configuration passed explicitly into archive-open and extraction
/// operations. `Default` matches the spec's stated defaults.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveConfig {
    /// Reject CRC mismatches during extraction instead of warning and
    /// continuing.
    pub strict_crc: bool,
    /// Disable the zipbomb expansion guard entirely.
    pub ignore_zipbomb: bool,
    /// Maximum allowed uncompressed/compressed ratio before `slack` applies.
    pub max_ratio: u64,
    /// Fixed allowance added on top of `compressed_size * max_ratio`.
    pub slack: u64,
}

impl ArchiveConfig {
    pub const DEFAULT_MAX_RATIO: u64 = 1000;
    pub const DEFAULT_SLACK: u64 = 1024 * 1024;

    /// Checks the expansion guard predicate: `uncompressed <= compressed *
    /// max_ratio + slack`, unless the guard is disabled.
    pub fn check_expansion(&self, compressed_size: u64, uncompressed_size: u64) -> bool {
        if self.ignore_zipbomb {
            return true;
        }
        let bound = compressed_size
            .saturating_mul(self.max_ratio)
            .saturating_add(self.slack);
        uncompressed_size <= bound
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig {
            strict_crc: false,
            ignore_zipbomb: false,
            max_ratio: Self::DEFAULT_MAX_RATIO,
            slack: Self::DEFAULT_SLACK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_allows_ordinary_ratios() {
        let cfg = ArchiveConfig::default();
        assert!(cfg.check_expansion(1_000_000, 5_000_000));
    }

    #[test]
    fn default_rejects_zipbomb_ratio() {
        let cfg = ArchiveConfig::default();
        // 100 compressed bytes claiming 10 GB uncompressed (spec scenario S6).
        assert!(!cfg.check_expansion(100, 10_000_000_000));
    }

    #[test]
    fn ignore_flag_bypasses_guard() {
        let mut cfg = ArchiveConfig::default();
        cfg.ignore_zipbomb = true;
        assert!(cfg.check_expansion(100, 10_000_000_000));
    }
}

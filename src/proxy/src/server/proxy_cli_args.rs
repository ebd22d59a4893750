use clap::Parser;

use crate::cache::ttl_store::TS_LENGTH;
use crate::filter::DebugFlags;

/// Demo-binary configuration: already-parsed numeric limits, mirroring the
/// shape of the teacher's own `ProxyServerArgs` (flattened sub-structs,
/// `value_name` annotations) without any of its backend/routing fields,
/// since the enclosing proxy framework is out of scope.
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "my-proxy",
    version = "0.1.0",
    about = "row-limiting MySQL result-set filter demo"
)]
pub struct ProxyServerArgs {
    /// Rows allowed through before a result set is discarded in favor of a
    /// synthetic OK (strictly-greater-than comparison: `N` rows pass, `N+1` discards).
    #[clap(long, value_name = "MAX_RESULTSET_ROWS", default_value_t = 1000)]
    pub max_resultset_rows: u32,
    /// Bytes of buffered response allowed before a result set is discarded.
    #[clap(long, value_name = "MAX_RESULTSET_SIZE", default_value_t = 1_048_576)]
    pub max_resultset_size: u32,
    /// Raw debug bitfield: `DECISIONS=1`, `DISCARDING=2`.
    #[clap(long, value_name = "DEBUG_BITS", default_value_t = 0)]
    pub debug: u32,
    #[clap(flatten)]
    pub cache: CacheTtlArgs,
    #[clap(long, value_name = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl ProxyServerArgs {
    pub fn debug_flags(&self) -> DebugFlags {
        DebugFlags::from_bits_truncate(self.debug)
    }
}

#[derive(clap::Parser, Debug, Clone)]
pub struct CacheTtlArgs {
    /// Milliseconds before a cached entry is reported stale; `0` disables the bound.
    #[clap(long, value_name = "SOFT_TTL_MS", default_value_t = 30_000)]
    pub soft_ttl_ms: i64,
    /// Milliseconds before a cached entry is evicted outright; `0` disables the bound.
    #[clap(long, value_name = "HARD_TTL_MS", default_value_t = 300_000)]
    pub hard_ttl_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_with_no_arguments() {
        let args = ProxyServerArgs::parse_from(["my-proxy"]);
        assert_eq!(args.max_resultset_rows, 1000);
        assert_eq!(args.max_resultset_size, 1_048_576);
        assert_eq!(args.debug_flags(), DebugFlags::empty());
        assert_eq!(args.cache.soft_ttl_ms, 30_000);
        assert_eq!(args.cache.hard_ttl_ms, 300_000);
    }

    #[test]
    fn debug_bits_decode_into_flags() {
        let args = ProxyServerArgs::parse_from(["my-proxy", "--debug", "3"]);
        assert!(args.debug_flags().contains(DebugFlags::DECISIONS));
        assert!(args.debug_flags().contains(DebugFlags::DISCARDING));
    }

    #[test]
    fn ts_length_matches_cache_suffix_width() {
        assert_eq!(TS_LENGTH, 8);
    }
}

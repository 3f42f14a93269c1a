//! Command line and environment configuration for srv-announcerd
//!
//! Every flag can also be set through a `SRV_ANNOUNCER_*` environment
//! variable. [`Args`] is the raw clap surface; [`Args::into_settings`]
//! validates it and produces the [`Settings`] the daemon runs with.

use anyhow::{Result, bail};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use srv_announcer_core::config::{HealthCheckConfig, SrvRecordSpec};
use srv_announcer_provider_cloudflare::{CLOUDFLARE_API_BASE, CloudflareConfig};
use std::time::Duration;
use tracing::{Level, info, warn};

/// Sidecar managing one entry in a DNS SRV record set (RFC 2782)
#[derive(Parser)]
#[command(name = "srv-announcerd", version, about, long_about = None)]
pub struct Args {
    /// Log level (trace|debug|info|warn|error)
    #[arg(
        short = 'l',
        long,
        env = "SRV_ANNOUNCER_LOG_LEVEL",
        default_value = "info",
        value_parser = parse_log_level
    )]
    pub log_level: Level,

    /// Don't touch DNS, only log what would be done
    #[arg(
        long,
        env = "SRV_ANNOUNCER_DRY_RUN",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub dry_run: bool,

    /// Name of the DNS zone holding the SRV record set
    #[arg(long, env = "SRV_ANNOUNCER_ZONE_NAME")]
    pub zone_name: Option<String>,

    /// RFC 2782 record set name (_service._proto.name)
    #[arg(long, env = "SRV_ANNOUNCER_SRV_RECORD_NAME")]
    pub srv_record_name: String,

    /// TTL of the SRV record set in seconds
    #[arg(long, env = "SRV_ANNOUNCER_SRV_RECORD_TTL", default_value_t = 60)]
    pub srv_record_ttl: u32,

    /// Priority of the SRV entry
    #[arg(long, env = "SRV_ANNOUNCER_SRV_RECORD_PRIORITY", default_value_t = 10)]
    pub srv_record_priority: u16,

    /// Weight of the SRV entry
    #[arg(long, env = "SRV_ANNOUNCER_SRV_RECORD_WEIGHT", default_value_t = 10)]
    pub srv_record_weight: u16,

    /// Port of the SRV entry
    #[arg(long, env = "SRV_ANNOUNCER_SRV_RECORD_PORT", default_value_t = 443)]
    pub srv_record_port: u16,

    /// Target of the SRV entry, usually this host's name ending with a dot
    #[arg(long, env = "SRV_ANNOUNCER_SRV_RECORD_TARGET")]
    pub srv_record_target: String,

    /// host:port to check, derived from the SRV target and port if unset
    #[arg(long, env = "SRV_ANNOUNCER_CHECK_TARGET")]
    pub check_target: Option<String>,

    /// Interval between checks (e.g. 500ms, 1.5s, 1m30s)
    #[arg(
        long,
        env = "SRV_ANNOUNCER_CHECK_INTERVAL",
        default_value = "10s",
        value_parser = parse_duration
    )]
    pub check_interval: Duration,

    /// Timeout for each check
    #[arg(
        long,
        env = "SRV_ANNOUNCER_CHECK_TIMEOUT",
        default_value = "1s",
        value_parser = parse_duration
    )]
    pub check_timeout: Duration,

    /// Cloudflare API token with Zone:DNS:Edit permission
    #[arg(long, env = "SRV_ANNOUNCER_CLOUDFLARE_API_TOKEN", hide_env_values = true)]
    pub cloudflare_api_token: Option<String>,

    #[arg(
        long,
        env = "SRV_ANNOUNCER_CLOUDFLARE_API_BASE",
        default_value = CLOUDFLARE_API_BASE,
        hide = true
    )]
    pub cloudflare_api_base: String,
}

/// Where record changes go
#[derive(Debug, Clone)]
pub enum Backend {
    /// Log intended changes only
    DryRun,
    /// Manage the record set through the Cloudflare API
    Cloudflare(CloudflareConfig),
}

/// Validated daemon settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Record set name the entry lives in
    pub record_name: String,

    /// The managed SRV entry
    pub spec: SrvRecordSpec,

    /// TCP health check
    pub check: HealthCheckConfig,

    /// Record backend
    pub backend: Backend,
}

impl Args {
    /// Validate the arguments and build the daemon settings
    ///
    /// Logs a warning for a target without a trailing dot and an info line
    /// when the check target is derived, so tracing should be initialized
    /// before calling this.
    pub fn into_settings(self) -> Result<Settings> {
        let record_name = self.srv_record_name.trim().to_string();
        if record_name.is_empty() {
            bail!(
                "--srv-record-name is required. \
                Set it via: export SRV_ANNOUNCER_SRV_RECORD_NAME=_service._proto.example.com"
            );
        }

        let spec = SrvRecordSpec::new(self.srv_record_target.trim())
            .with_port(self.srv_record_port)
            .with_priority(self.srv_record_priority)
            .with_weight(self.srv_record_weight)
            .with_ttl(self.srv_record_ttl);
        spec.validate()?;

        if !spec.is_fully_qualified() {
            warn!(
                srv_target = %spec.target,
                "SRV target doesn't end with a dot, which is probably not what you want. Continuing anyway"
            );
        }

        let check = match self.check_target.filter(|t| !t.trim().is_empty()) {
            Some(target) => HealthCheckConfig::new(target.trim()),
            None => {
                let derived = HealthCheckConfig::derived_from(&spec);
                info!(
                    check_target = %derived.target,
                    "Check target derived from SRV record target and port"
                );
                derived
            }
        }
        .with_interval(self.check_interval)
        .with_timeout(self.check_timeout);
        check.validate()?;

        let backend = if self.dry_run {
            Backend::DryRun
        } else {
            let zone_name = match self.zone_name {
                Some(zone) if !zone.trim().is_empty() => zone.trim().to_string(),
                _ => bail!(
                    "--zone-name is required unless --dry-run is set. \
                    Set it via: export SRV_ANNOUNCER_ZONE_NAME=example.com"
                ),
            };

            let api_token = match self.cloudflare_api_token {
                Some(token) if !token.trim().is_empty() => token.trim().to_string(),
                _ => bail!(
                    "--cloudflare-api-token is required unless --dry-run is set. \
                    Set it via: export SRV_ANNOUNCER_CLOUDFLARE_API_TOKEN=your_token"
                ),
            };

            let config = CloudflareConfig::new(api_token, zone_name, record_name.clone())
                .with_api_base(self.cloudflare_api_base.trim_end_matches('/'));
            config.validate()?;
            Backend::Cloudflare(config)
        };

        Ok(Settings {
            record_name,
            spec,
            check,
            backend,
        })
    }
}

/// Parse a log level name
pub fn parse_log_level(s: &str) -> std::result::Result<Level, String> {
    match s.trim().to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(format!(
            "'{}' is not a valid log level. Valid levels: trace, debug, info, warn, error",
            other
        )),
    }
}

/// Parse a duration such as `250ms`, `1.5s`, `1m30s` or `1h`
///
/// Accepts one or more `<number><unit>` segments with units `ns`, `us`
/// (or `µs`), `ms`, `s`, `m` and `h`. Numbers may carry a fraction. A bare
/// integer is taken as seconds.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let input = s.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    if input.bytes().all(|b| b.is_ascii_digit()) {
        return input
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| format!("'{}' is not a valid duration: {}", input, e));
    }

    let invalid = || format!("'{}' is not a valid duration", input);
    let mut rest = input;
    let mut total_nanos: u128 = 0;

    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| {
                format!("'{}' is missing a unit. Valid units: ns, us, ms, s, m, h", input)
            })?;
        let (number, tail) = rest.split_at(number_end);

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);

        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            other => {
                return Err(format!(
                    "'{}' has an unknown unit '{}'. Valid units: ns, us, ms, s, m, h",
                    input, other
                ));
            }
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if fraction.contains('.') {
            return Err(invalid());
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut nanos = whole.checked_mul(unit_nanos).ok_or_else(invalid)?;

        // Fraction digits beyond nanosecond precision are truncated
        let mut scale = unit_nanos;
        for digit in fraction.bytes() {
            scale /= 10;
            if scale == 0 {
                break;
            }
            nanos += u128::from(digit - b'0') * scale;
        }

        total_nanos = total_nanos.checked_add(nanos).ok_or_else(invalid)?;
        rest = next;
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000)
        .map_err(|_| format!("'{}' is too large", input))?;
    let subsec = (total_nanos % 1_000_000_000) as u32;
    Ok(Duration::new(secs, subsec))
}

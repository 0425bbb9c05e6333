use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use tokio::sync::Semaphore;

use crate::{errors::Error, Result};

pub const DEFAULT_SESSION_DIR: &str = "./whatsapp-session";
pub const DEFAULT_LOG_LEVEL: &str = "INFO";
pub const DEFAULT_PAIRING_TIMEOUT_SECS: u64 = 120;
pub const MAX_PAIRING_TIMEOUT_SECS: u64 = 24 * 3600;
pub const DEFAULT_REPLY_CONCURRENCY: usize = 64;

pub const DEFAULT_DAILY_TIMEZONE: &str = "America/Sao_Paulo";
pub const DEFAULT_DAILY_GROUP: &str = "120363319804897565@g.us";
pub const DEFAULT_DAILY_MESSAGE: &str = "Olá, grupo! Esta é sua mensagem diária às 10:15 ⏰";

/// Typed configuration, read from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    pub session_dir: PathBuf,
    pub log_level: String,

    // Session client
    pub pairing_timeout: Duration,

    // Runtime limits
    pub reply_concurrency: usize,
    pub shutdown_grace: Duration,

    pub daily: DailyConfig,
}

/// Daily scheduled message.
///
/// The timezone stays a string here: resolving it is the scheduler's job so a
/// bad name disables only the scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailyConfig {
    pub enabled: bool,
    pub hour: u32,
    pub minute: u32,
    pub timezone: String,
    pub group: String,
    pub message: String,
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: 10,
            minute: 15,
            timezone: DEFAULT_DAILY_TIMEZONE.to_string(),
            group: DEFAULT_DAILY_GROUP.to_string(),
            message: DEFAULT_DAILY_MESSAGE.to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process env in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let session_dir = PathBuf::from(
            get("ZAP_SESSION_DIR").unwrap_or_else(|| DEFAULT_SESSION_DIR.to_string()),
        );
        let log_level = get("ZAP_LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let pairing_secs = parse_num(&get, "ZAP_PAIRING_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_PAIRING_TIMEOUT_SECS);
        if pairing_secs == 0 || pairing_secs > MAX_PAIRING_TIMEOUT_SECS {
            return Err(Error::Config(format!(
                "ZAP_PAIRING_TIMEOUT_SECS must be between 1 and {MAX_PAIRING_TIMEOUT_SECS}, got {pairing_secs}"
            )));
        }
        let pairing_timeout = Duration::from_secs(pairing_secs);

        let reply_concurrency = match parse_num(&get, "ZAP_REPLY_CONCURRENCY")? {
            None => DEFAULT_REPLY_CONCURRENCY,
            Some(n) => usize::try_from(n)
                .ok()
                .filter(|n| (1..=Semaphore::MAX_PERMITS).contains(n))
                .ok_or_else(|| {
                    Error::Config(format!(
                        "ZAP_REPLY_CONCURRENCY must be between 1 and {}, got {n}",
                        Semaphore::MAX_PERMITS
                    ))
                })?,
        };
        let shutdown_grace =
            Duration::from_millis(parse_num(&get, "ZAP_SHUTDOWN_GRACE_MS")?.unwrap_or(5_000));

        let defaults = DailyConfig::default();
        let (hour, minute) = match get("ZAP_DAILY_TIME") {
            Some(raw) => parse_hh_mm(&raw)?,
            None => (defaults.hour, defaults.minute),
        };
        let daily = DailyConfig {
            enabled: get("ZAP_DAILY_ENABLED")
                .map(|s| parse_bool(&s))
                .unwrap_or(defaults.enabled),
            hour,
            minute,
            timezone: get("ZAP_DAILY_TIMEZONE").unwrap_or(defaults.timezone),
            group: get("ZAP_DAILY_GROUP").unwrap_or(defaults.group),
            message: get("ZAP_DAILY_MESSAGE").unwrap_or(defaults.message),
        };

        Ok(Self {
            session_dir,
            log_level,
            pairing_timeout,
            reply_concurrency,
            shutdown_grace,
            daily,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        return &s[1..s.len() - 1];
    }
    s
}

fn parse_num(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// `HH:MM`, 24-hour clock.
pub fn parse_hh_mm(raw: &str) -> Result<(u32, u32)> {
    let bad = || Error::Config(format!("expected HH:MM, got {raw:?}"));
    let (h, m) = raw.trim().split_once(':').ok_or_else(bad)?;
    let hour: u32 = h.trim().parse().map_err(|_| bad())?;
    let minute: u32 = m.trim().parse().map_err(|_| bad())?;
    if hour > 23 || minute > 59 {
        return Err(bad());
    }
    Ok((hour, minute))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_match_the_stock_bot() {
        let cfg = from_pairs(&[]).unwrap();
        assert_eq!(cfg.session_dir, PathBuf::from("./whatsapp-session"));
        assert_eq!(cfg.log_level, "INFO");
        assert_eq!(cfg.pairing_timeout, Duration::from_secs(120));
        assert_eq!(cfg.reply_concurrency, 64);
        assert_eq!(cfg.shutdown_grace, Duration::from_secs(5));
        assert_eq!(cfg.daily, DailyConfig::default());
        assert_eq!((cfg.daily.hour, cfg.daily.minute), (10, 15));
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = from_pairs(&[
            ("ZAP_SESSION_DIR", "/var/lib/zap"),
            ("ZAP_PAIRING_TIMEOUT_SECS", "300"),
            ("ZAP_REPLY_CONCURRENCY", "8"),
            ("ZAP_DAILY_TIME", "07:05"),
            ("ZAP_DAILY_ENABLED", "no"),
            ("ZAP_DAILY_TIMEZONE", "Europe/Lisbon"),
            ("ZAP_SHUTDOWN_GRACE_MS", "250"),
            ("ZAP_LOG_LEVEL", "  "),
        ])
        .unwrap();
        assert_eq!(cfg.session_dir, PathBuf::from("/var/lib/zap"));
        assert_eq!(cfg.pairing_timeout, Duration::from_secs(300));
        assert_eq!(cfg.reply_concurrency, 8);
        assert_eq!((cfg.daily.hour, cfg.daily.minute), (7, 5));
        assert!(!cfg.daily.enabled);
        assert_eq!(cfg.daily.timezone, "Europe/Lisbon");
        assert_eq!(cfg.shutdown_grace, Duration::from_millis(250));
        assert_eq!(cfg.log_level, "INFO");
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for pairs in [
            [("ZAP_DAILY_TIME", "25:00")],
            [("ZAP_DAILY_TIME", "1015")],
            [("ZAP_REPLY_CONCURRENCY", "0")],
            [("ZAP_SHUTDOWN_GRACE_MS", "-1")],
            [("ZAP_REPLY_CONCURRENCY", "18446744073709551615")],
            [("ZAP_PAIRING_TIMEOUT_SECS", "18446744073709551615")],
            [("ZAP_PAIRING_TIMEOUT_SECS", "0")],
        ] {
            let err = from_pairs(&pairs).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{pairs:?}");
        }
    }

    #[test]
    fn reply_concurrency_tops_out_at_semaphore_capacity() {
        let max = Semaphore::MAX_PERMITS.to_string();
        let cfg = from_pairs(&[("ZAP_REPLY_CONCURRENCY", max.as_str())]).unwrap();
        assert_eq!(cfg.reply_concurrency, Semaphore::MAX_PERMITS);
        let sup = crate::supervisor::TaskSupervisor::new(
            cfg.reply_concurrency,
            tokio_util::sync::CancellationToken::new(),
        );
        assert_eq!(sup.in_flight(), 0);

        let over = (Semaphore::MAX_PERMITS as u64 + 1).to_string();
        assert!(from_pairs(&[("ZAP_REPLY_CONCURRENCY", over.as_str())]).is_err());
    }

    #[test]
    fn strips_matching_quotes_only() {
        assert_eq!(strip_quotes("\"a b\""), "a b");
        assert_eq!(strip_quotes("'x'"), "x");
        assert_eq!(strip_quotes("\"x'"), "\"x'");
    }
}

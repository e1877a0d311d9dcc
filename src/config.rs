use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.dongqiudi.com";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const DATA_DIR: &str = "team_roster_scraper";
const DB_FILE: &str = "teams.sqlite";

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeConfig {
    pub base_url: String,
    pub db_path: Option<PathBuf>,
    pub request_delay: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub user_agent: String,
    pub debug_dump_dir: Option<PathBuf>,
    pub max_teams: Option<usize>,
    /// Store `base_info` from the same page during roster crawls.
    pub with_details: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            db_path: None,
            request_delay: Duration::from_millis(2000),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_millis(1000),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            debug_dump_dir: None,
            max_teams: None,
            with_details: true,
        }
    }
}

impl ScrapeConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::from_lookup(|key| env::var(key).ok());
        if cfg.db_path.is_none() {
            cfg.db_path = default_db_path();
        }
        cfg
    }

    /// Builds a config from any key lookup; unset or unparsable keys keep
    /// their defaults and numeric values are clamped to sane ranges.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let num = |key: &str| get(key).and_then(|v| v.parse::<u64>().ok());
        let d = Self::default();

        Self {
            base_url: get("SCRAPE_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(d.base_url),
            db_path: get("SCRAPE_DB_PATH").map(PathBuf::from),
            request_delay: num("SCRAPE_REQUEST_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.request_delay),
            timeout: num("SCRAPE_TIMEOUT_SECS")
                .map(|s| Duration::from_secs(s.clamp(1, 300)))
                .unwrap_or(d.timeout),
            max_retries: num("SCRAPE_MAX_RETRIES")
                .map(|n| n.clamp(0, 10) as u32)
                .unwrap_or(d.max_retries),
            retry_backoff: num("SCRAPE_RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.retry_backoff),
            user_agent: get("SCRAPE_USER_AGENT").unwrap_or(d.user_agent),
            debug_dump_dir: get("SCRAPE_DEBUG_DUMP_DIR").map(PathBuf::from),
            max_teams: num("SCRAPE_MAX_TEAMS").map(|n| n as usize).filter(|n| *n > 0),
            with_details: get("SCRAPE_WITH_DETAILS")
                .map(|v| parse_bool(&v))
                .unwrap_or(d.with_details),
        }
    }
}

fn parse_bool(raw: &str) -> bool {
    let t = raw.trim().to_ascii_lowercase();
    !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
}

pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_DATA_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(DATA_DIR).join(DB_FILE));
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(DATA_DIR)
            .join(DB_FILE),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_env_gives_defaults() {
        assert_eq!(ScrapeConfig::from_lookup(|_| None), ScrapeConfig::default());
    }

    #[test]
    fn values_are_parsed_and_clamped() {
        let cfg = ScrapeConfig::from_lookup(lookup(&[
            ("SCRAPE_BASE_URL", "http://localhost:8080/"),
            ("SCRAPE_REQUEST_DELAY_MS", "0"),
            ("SCRAPE_TIMEOUT_SECS", "9999"),
            ("SCRAPE_MAX_RETRIES", "42"),
            ("SCRAPE_MAX_TEAMS", "3"),
            ("SCRAPE_WITH_DETAILS", "off"),
            ("SCRAPE_DB_PATH", "/tmp/t.sqlite"),
        ]));
        assert_eq!(cfg.base_url, "http://localhost:8080");
        assert_eq!(cfg.request_delay, Duration::ZERO);
        assert_eq!(cfg.timeout, Duration::from_secs(300));
        assert_eq!(cfg.max_retries, 10);
        assert_eq!(cfg.max_teams, Some(3));
        assert!(!cfg.with_details);
        assert_eq!(cfg.db_path, Some(PathBuf::from("/tmp/t.sqlite")));
    }

    #[test]
    fn garbage_numbers_fall_back() {
        let cfg = ScrapeConfig::from_lookup(lookup(&[
            ("SCRAPE_TIMEOUT_SECS", "soon"),
            ("SCRAPE_MAX_TEAMS", "0"),
        ]));
        assert_eq!(cfg.timeout, Duration::from_secs(30));
        assert_eq!(cfg.max_teams, None);
    }
}

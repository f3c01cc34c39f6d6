use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// When true, the answer model is forbidden from returning `suggest` and
    /// any stray `suggest` collapses to `autofill`. When false, `suggest`
    /// survives end-to-end and is counted separately in the plan summary.
    pub strict_autofill_only: bool,
    /// How the "existing completed plan" cache lookup is keyed.
    pub cache_key_strategy: CacheKeyStrategy,
    /// Which field extraction strategy this deployment runs.
    pub extraction_strategy: ExtractionStrategyKind,
}

/// Cache key for completed-plan reuse.
/// `PageUrl` matches on (job application, user, page URL) alone; `DomHash`
/// additionally requires the stored DOM content hash to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKeyStrategy {
    PageUrl,
    DomHash,
}

impl CacheKeyStrategy {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "page_url" => Ok(CacheKeyStrategy::PageUrl),
            "dom_hash" => Ok(CacheKeyStrategy::DomHash),
            other => bail!("CACHE_KEY_STRATEGY must be 'page_url' or 'dom_hash', got '{other}'"),
        }
    }
}

/// Which extraction strategy the deployment wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategyKind {
    /// Pre-extracted field descriptors from the browser extension (canonical).
    Extension,
    /// Server-side parse of the raw DOM HTML snapshot.
    Html,
}

impl ExtractionStrategyKind {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "extension" => Ok(ExtractionStrategyKind::Extension),
            "html" => Ok(ExtractionStrategyKind::Html),
            other => bail!("EXTRACTION_STRATEGY must be 'extension' or 'html', got '{other}'"),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            strict_autofill_only: parse_bool_flag(
                &std::env::var("STRICT_AUTOFILL_ONLY").unwrap_or_else(|_| "true".to_string()),
            )
            .context("STRICT_AUTOFILL_ONLY must be a boolean")?,
            cache_key_strategy: CacheKeyStrategy::parse(
                &std::env::var("CACHE_KEY_STRATEGY").unwrap_or_else(|_| "page_url".to_string()),
            )?,
            extraction_strategy: ExtractionStrategyKind::parse(
                &std::env::var("EXTRACTION_STRATEGY").unwrap_or_else(|_| "extension".to_string()),
            )?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_bool_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean flag, got '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_flag_variants() {
        assert!(parse_bool_flag("true").unwrap());
        assert!(parse_bool_flag("1").unwrap());
        assert!(parse_bool_flag("ON").unwrap());
        assert!(!parse_bool_flag("false").unwrap());
        assert!(!parse_bool_flag("0").unwrap());
        assert!(parse_bool_flag("maybe").is_err());
    }

    #[test]
    fn test_cache_key_strategy_parse() {
        assert_eq!(
            CacheKeyStrategy::parse("page_url").unwrap(),
            CacheKeyStrategy::PageUrl
        );
        assert_eq!(
            CacheKeyStrategy::parse("DOM_HASH").unwrap(),
            CacheKeyStrategy::DomHash
        );
        assert!(CacheKeyStrategy::parse("content").is_err());
    }

    #[test]
    fn test_extraction_strategy_parse() {
        assert_eq!(
            ExtractionStrategyKind::parse("extension").unwrap(),
            ExtractionStrategyKind::Extension
        );
        assert_eq!(
            ExtractionStrategyKind::parse("html").unwrap(),
            ExtractionStrategyKind::Html
        );
        assert!(ExtractionStrategyKind::parse("dom").is_err());
    }
}

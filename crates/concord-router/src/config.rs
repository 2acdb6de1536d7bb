use anyhow::Context;
use concord_core::ConsensusConfig;

/// JSON overlay on top of the default policy, e.g. `{"cluster_threshold":0.35}`.
pub const CONFIG_ENV: &str = "CONCORD_CONFIG";
pub const ADDR_ENV: &str = "CONCORD_ADDR";
pub const DEFAULT_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 7443);

pub fn load() -> anyhow::Result<ConsensusConfig> {
    from_overlay(std::env::var(CONFIG_ENV).ok().as_deref())
}

pub fn from_overlay(raw: Option<&str>) -> anyhow::Result<ConsensusConfig> {
    let config: ConsensusConfig = match raw {
        Some(s) if !s.trim().is_empty() => serde_json::from_str(s).with_context(|| format!("parsing {CONFIG_ENV}"))?,
        _ => ConsensusConfig::default(),
    };
    config.validate().context("validating consensus policy")?;
    Ok(config)
}

pub fn listen_addr() -> anyhow::Result<std::net::SocketAddr> {
    match std::env::var(ADDR_ENV) {
        Ok(s) => s.parse().with_context(|| format!("parsing {ADDR_ENV}={s}")),
        Err(_) => Ok(std::net::SocketAddr::from(DEFAULT_ADDR)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_overlay_means_defaults() {
        assert_eq!(from_overlay(None).unwrap(), ConsensusConfig::default());
        assert_eq!(from_overlay(Some("  ")).unwrap(), ConsensusConfig::default());
    }

    #[test]
    fn overlay_overrides_named_fields() {
        let cfg = from_overlay(Some(r#"{"outlier_threshold":0.2,"metrics":{"outlier":0.1}}"#)).unwrap();
        assert_eq!(cfg.outlier_threshold, 0.2);
        assert_eq!(cfg.metrics.outlier, 0.1);
        assert_eq!(cfg.cluster_threshold, ConsensusConfig::default().cluster_threshold);
    }

    #[test]
    fn malformed_overlay_is_an_error() {
        let err = from_overlay(Some("{not json")).unwrap_err();
        assert!(err.to_string().contains(CONFIG_ENV));
    }

    #[test]
    fn out_of_range_overlay_is_an_error() {
        assert!(from_overlay(Some(r#"{"cluster_threshold":2.0}"#)).is_err());
    }
}

use std::time::Duration;

use tracing::warn;

use crate::navigation::NavigationConfig;
use crate::style::StyleConfig;

const ENV_PREFIX: &str = "CHATTREE_";

/// Runtime settings, defaults overridable through `CHATTREE_*` environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub style: StyleConfig,
    pub navigation: NavigationConfig,
    /// Pause between streamed words of the scripted assistant
    pub stream_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            style: StyleConfig::default(),
            navigation: NavigationConfig::default(),
            stream_delay: Duration::from_millis(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Apply `CHATTREE_<FIELD>` overrides. Malformed values are logged and
    /// skipped, out of range ones are clamped by the field spec.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Config::default();
        for (key, value) in vars {
            let Some(field) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let field = field.to_ascii_lowercase();
            let value = value.as_ref().trim();
            if let Err(err) = config.apply(&field, value) {
                warn!("config: ignoring {}{}={:?}: {}", ENV_PREFIX, field.to_ascii_uppercase(), value, err);
            }
        }
        config
    }

    fn apply(&mut self, field: &str, value: &str) -> anyhow::Result<()> {
        match field {
            "edge_type" => self.style.edge_type = value.parse()?,
            "edge_animated" => self.style.edge_animated = parse_flag(value)?,
            "scroll_gap_ms" => self.navigation.scroll_gap = Duration::from_millis(value.parse()?),
            "click_gap_ms" => self.navigation.click_gap = Duration::from_millis(value.parse()?),
            "stream_delay_ms" => self.stream_delay = Duration::from_millis(value.parse()?),
            _ if StyleConfig::field(field).is_some() => {
                let number: f32 = value.parse()?;
                self.style.set(field, number);
            }
            _ => anyhow::bail!("unknown setting"),
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::EdgeType;

    #[test]
    fn no_overrides_means_defaults() {
        let config = Config::from_vars([("PATH", "/usr/bin"), ("HOME", "/root")]);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn overrides_apply() {
        let config = Config::from_vars([
            ("CHATTREE_MAX_CHARACTERS", "0"),
            ("CHATTREE_NODE_WIDTH", "5000"),
            ("CHATTREE_EDGE_TYPE", "step"),
            ("CHATTREE_EDGE_ANIMATED", "yes"),
            ("CHATTREE_SCROLL_GAP_MS", "150"),
            ("CHATTREE_CLICK_GAP_MS", "250"),
            ("CHATTREE_STREAM_DELAY_MS", "0"),
        ]);
        assert_eq!(config.style.max_characters, 0);
        assert_eq!(config.style.node_width, 400.0);
        assert_eq!(config.style.edge_type, EdgeType::Step);
        assert!(config.style.edge_animated);
        assert_eq!(config.navigation.scroll_gap, Duration::from_millis(150));
        assert_eq!(config.navigation.click_gap, Duration::from_millis(250));
        assert_eq!(config.stream_delay, Duration::ZERO);
    }

    #[test]
    fn malformed_values_are_skipped() {
        let config = Config::from_vars([
            ("CHATTREE_FONT_SIZE", "large"),
            ("CHATTREE_EDGE_ANIMATED", "maybe"),
            ("CHATTREE_WHATEVER", "1"),
        ]);
        assert_eq!(config, Config::default());
    }
}

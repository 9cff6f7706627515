use std::env;

/// Runtime configuration, resolved once at startup and passed explicitly to
/// whatever needs it. Nothing reads the environment after this.
#[derive(Debug, Clone)]
pub struct Config {
    pub spider_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    /// Upper bound on dioceses processed by one `run` invocation.
    pub max_dioceses: usize,
    /// Politeness delay between successive site visits, in seconds.
    pub request_delay_secs: f64,
    /// Minimum oracle score for a directory candidate to be accepted.
    pub ai_score_threshold: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spider_api_key: None,
            gemini_api_key: None,
            max_dioceses: 5,
            request_delay_secs: 2.0,
            ai_score_threshold: 7,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            spider_api_key: env_var("SPIDER_API_KEY"),
            gemini_api_key: env_var("GEMINI_API_KEY"),
            ..Self::default()
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.max_dioceses, 5);
        assert_eq!(cfg.request_delay_secs, 2.0);
        assert_eq!(cfg.ai_score_threshold, 7);
    }
}

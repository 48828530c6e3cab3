use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "PayTjek";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default Ollama endpoint used when no Mistral key is configured.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default Mistral chat model.
pub const DEFAULT_MISTRAL_MODEL: &str = "mistral-medium";

/// Uploads larger than this are rejected before OCR.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Default LLM request timeout.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 300;

/// Get the application data directory (~/PayTjek/).
/// Falls back to the working directory when no home directory is known.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "paytjek_lib=debug,paytjek=debug,info"
    } else {
        "paytjek_lib=info,paytjek=info,warn"
    }
}

/// Runtime settings, read from the process environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Debug mode keeps uploaded files after OCR and enables the diagnostic dump.
    pub debug: bool,
    pub environment: String,
    pub mistral_api_key: Option<String>,
    pub mistral_model: String,
    pub ollama_url: String,
    /// Ollama model to use. `None` picks the best installed one.
    pub ollama_model: Option<String>,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub llm_timeout_secs: u64,
    pub dump_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            environment: "production".into(),
            mistral_api_key: None,
            mistral_model: DEFAULT_MISTRAL_MODEL.into(),
            ollama_url: DEFAULT_OLLAMA_URL.into(),
            ollama_model: None,
            upload_dir: PathBuf::from("temp_uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            dump_dir: None,
        }
    }
}

impl Settings {
    /// Build settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let debug = non_empty("PAYTJEK_DEBUG")
            .or_else(|| non_empty("DEBUG"))
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            debug,
            environment: non_empty("PAYTJEK_ENVIRONMENT").unwrap_or(defaults.environment),
            mistral_api_key: non_empty("MISTRAL_API_KEY"),
            mistral_model: non_empty("PAYTJEK_MISTRAL_MODEL").unwrap_or(defaults.mistral_model),
            ollama_url: non_empty("PAYTJEK_OLLAMA_URL").unwrap_or(defaults.ollama_url),
            ollama_model: non_empty("PAYTJEK_OLLAMA_MODEL"),
            upload_dir: non_empty("PAYTJEK_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            max_upload_bytes: parse_or(
                non_empty("PAYTJEK_MAX_UPLOAD_BYTES"),
                "PAYTJEK_MAX_UPLOAD_BYTES",
                defaults.max_upload_bytes,
            ),
            llm_timeout_secs: parse_or(
                non_empty("PAYTJEK_LLM_TIMEOUT_SECS"),
                "PAYTJEK_LLM_TIMEOUT_SECS",
                defaults.llm_timeout_secs,
            ),
            dump_dir: non_empty("PAYTJEK_DUMP_DIR").map(PathBuf::from),
        }
    }

    /// Directory for diagnostic dumps, if dumping is enabled.
    ///
    /// An explicit `PAYTJEK_DUMP_DIR` always wins; debug mode falls back to
    /// `~/PayTjek/diagnostic`.
    pub fn diagnostic_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.dump_dir {
            return Some(dir.clone());
        }
        self.debug.then(|| app_data_dir().join("diagnostic"))
    }
}

fn parse_or(raw: Option<String>, key: &str, default: u64) -> u64 {
    match raw {
        None => default,
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %v, default, "Invalid numeric setting, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with("PayTjek"));
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let settings = settings_from(&[]);
        assert!(!settings.debug);
        assert_eq!(settings.environment, "production");
        assert!(settings.mistral_api_key.is_none());
        assert_eq!(settings.mistral_model, "mistral-medium");
        assert_eq!(settings.upload_dir, PathBuf::from("temp_uploads"));
        assert_eq!(settings.max_upload_bytes, 10 * 1024 * 1024);
        assert!(settings.diagnostic_dir().is_none());
    }

    #[test]
    fn debug_flag_is_case_insensitive() {
        assert!(settings_from(&[("DEBUG", "True")]).debug);
        assert!(settings_from(&[("PAYTJEK_DEBUG", "TRUE")]).debug);
        assert!(!settings_from(&[("DEBUG", "yes")]).debug);
    }

    #[test]
    fn prefixed_debug_wins_over_plain() {
        let settings = settings_from(&[("PAYTJEK_DEBUG", "false"), ("DEBUG", "true")]);
        assert!(!settings.debug);
    }

    #[test]
    fn blank_api_key_is_ignored() {
        let settings = settings_from(&[("MISTRAL_API_KEY", "   ")]);
        assert!(settings.mistral_api_key.is_none());
    }

    #[test]
    fn invalid_number_falls_back_to_default() {
        let settings = settings_from(&[("PAYTJEK_MAX_UPLOAD_BYTES", "lots")]);
        assert_eq!(settings.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        let settings = settings_from(&[("PAYTJEK_LLM_TIMEOUT_SECS", "60")]);
        assert_eq!(settings.llm_timeout_secs, 60);
    }

    #[test]
    fn explicit_dump_dir_enables_diagnostics() {
        let settings = settings_from(&[("PAYTJEK_DUMP_DIR", "/tmp/dump")]);
        assert_eq!(settings.diagnostic_dir(), Some(PathBuf::from("/tmp/dump")));
    }

    #[test]
    fn debug_mode_uses_app_data_dump_dir() {
        let settings = settings_from(&[("DEBUG", "true")]);
        let dir = settings.diagnostic_dir().unwrap();
        assert!(dir.starts_with(app_data_dir()));
        assert!(dir.ends_with("diagnostic"));
    }
}

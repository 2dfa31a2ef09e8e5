use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    // Read the configuration file
    let content = std::fs::read_to_string(path)?;

    // Parse TOML
    let config: Config = toml::from_str(&content)?;

    // Validate the configuration
    validate(&config)?;

    Ok(config)
}

/// Loads the configuration file when one is given, otherwise the defaults
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let config = Config::default();
            validate(&config)?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
base-url = "https://qa.example.com/"
user-agent = "TestArchiver/1.0"
page-timeout-secs = 60
media-timeout-secs = 10
max-concurrent-articles = 4

[output]
database-path = "./test.db"
output-dir = "./out"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.base_url, "https://qa.example.com/");
        assert_eq!(config.crawler.page_timeout_secs, 60);
        assert_eq!(config.crawler.media_timeout_secs, 10);
        assert_eq!(config.crawler.max_concurrent_articles, 4);
        assert_eq!(config.output.output_dir, "./out");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let file = create_temp_config("[output]\noutput-dir = \"./elsewhere\"\n");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.output.output_dir, "./elsewhere");
        assert_eq!(config.output.database_path, "data.db");
        assert_eq!(config.crawler.page_timeout_secs, 120);
        assert_eq!(config.crawler.media_timeout_secs, 15);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/archiver.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config("[crawler]\nmax-concurrent-articles = 0\n");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = load_config_or_default(None).unwrap();
        assert_eq!(config.crawler.base_url, "https://ask.fm/");
    }
}

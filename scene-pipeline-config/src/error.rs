#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("could not parse config file: {source}")]
    TomlDe {
        #[from]
        source: toml::de::Error,
    },
    #[error("{provider} is selected but its API key is not configured")]
    MissingApiKey { provider: &'static str },
}

//! Runtime settings: defaults, an optional `flux.toml` file, and `FLUX_*`
//! environment variables, in increasing precedence.

use std::path::PathBuf;

use config::{Config, Environment, File};
use serde::Deserialize;
use validator::Validate;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    /// Directory of the embedded document database.
    pub database: PathBuf,

    /// Read API listen address.
    #[validate(length(min = 1))]
    pub listen: String,

    /// Origin echoed in the API's CORS allow-origin header.
    #[validate(length(min = 1))]
    pub cors_host: String,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .set_default("database", "flux.db")?
            .set_default("listen", "127.0.0.1:8080")?
            .set_default("cors_host", "http://localhost")?
            .add_source(File::with_name("flux").required(false))
            .add_source(Environment::with_prefix("FLUX"))
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::load().unwrap();
        assert!(!settings.listen.is_empty());
        assert!(!settings.cors_host.is_empty());
        assert!(!settings.database.as_os_str().is_empty());
    }
}

use rstdev_config::format::use_toml;
use rstdev_config::parser::from_file;
use rstdev_config::{types::ConfigError, Builder};

use crate::common::types::{CommonError, ToValidate};

use super::Config;

pub struct Parser {
    conf_file: String,
}

impl Parser {
    pub fn new(conf_file: String) -> Self {
        Self { conf_file }
    }

    pub fn parse(&self) -> Result<Config, ConfigError> {
        let config_builder: Result<Config, ConfigError> =
            Builder::new(from_file(self.conf_file.to_owned()))
                .fetch()?
                .parse(use_toml);

        config_builder
    }

    /// Parses then validates the configuration file
    pub fn load(&self) -> Result<Config, CommonError> {
        let config = self
            .parse()
            .map_err(|err| CommonError::ConfigError(format!("{:?}", err)))?;

        config.validate()?;
        Ok(config)
    }
}

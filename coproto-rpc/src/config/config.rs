use rst_common::standard::serde::{self, Deserialize};

use crate::common::types::{CommonError, ToValidate};

use super::{Connection, Logging, Transport};

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(crate = "self::serde")]
pub struct Config {
    #[serde(default)]
    pub(super) connection: Connection,

    #[serde(default)]
    pub(super) transport: Transport,

    #[serde(default)]
    pub(super) logging: Logging,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn logging(&self) -> &Logging {
        &self.logging
    }
}

impl ToValidate for Config {
    fn validate(&self) -> Result<(), CommonError> {
        _ = self.connection.validate()?;
        _ = self.transport.validate()?;
        _ = self.logging.validate()?;

        Ok(())
    }
}

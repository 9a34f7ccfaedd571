use std::time::Duration;

use rst_common::standard::serde::{self, Deserialize};

use crate::common::types::{CommonError, ToValidate};

/// `Transport` configures the checks applied to coprotocol replies
#[derive(Deserialize, Debug, Clone)]
#[serde(crate = "self::serde")]
#[serde(default)]
pub struct Transport {
    pub(super) check_verkeys: bool,
    pub(super) check_protocols: bool,
    pub(super) default_ttl_secs: u64,
}

impl Transport {
    pub fn check_verkeys(&self) -> bool {
        self.check_verkeys
    }

    pub fn check_protocols(&self) -> bool {
        self.check_protocols
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            check_verkeys: false,
            check_protocols: true,
            default_ttl_secs: 60,
        }
    }
}

impl ToValidate for Transport {
    fn validate(&self) -> Result<(), CommonError> {
        if self.default_ttl_secs == 0 {
            return Err(CommonError::ValidationError(
                "config: transport:default_ttl_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

use std::time::Duration;

use rst_common::standard::serde::{self, Deserialize};

use crate::common::types::{CommonError, ToValidate};

/// `Connection` configures the connection to the remote agent
#[derive(Deserialize, Debug, Clone)]
#[serde(crate = "self::serde")]
#[serde(default)]
pub struct Connection {
    pub(super) timeout_secs: u64,
    pub(super) handshake_timeout_secs: u64,
    pub(super) reply_timeout_secs: u64,
}

impl Connection {
    /// Maximum wait of one RPC call
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Wait of a coprotocol reply when the conversation has no TTL
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            handshake_timeout_secs: 10,
            reply_timeout_secs: 60,
        }
    }
}

impl ToValidate for Connection {
    fn validate(&self) -> Result<(), CommonError> {
        if self.timeout_secs == 0 {
            return Err(CommonError::ValidationError(
                "config: connection:timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.handshake_timeout_secs == 0 {
            return Err(CommonError::ValidationError(
                "config: connection:handshake_timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.reply_timeout_secs == 0 {
            return Err(CommonError::ValidationError(
                "config: connection:reply_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

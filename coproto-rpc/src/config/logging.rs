use rst_common::standard::serde::{self, Deserialize};

use crate::common::types::{CommonError, ToValidate};

#[derive(Deserialize, Debug, Clone)]
#[serde(crate = "self::serde")]
#[serde(default)]
pub struct Logging {
    pub(super) filter: String,
}

impl Logging {
    pub fn filter(&self) -> &str {
        &self.filter
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl ToValidate for Logging {
    fn validate(&self) -> Result<(), CommonError> {
        if self.filter.trim().is_empty() {
            return Err(CommonError::ValidationError(
                "config: logging:filter is missing".to_string(),
            ));
        }

        Ok(())
    }
}

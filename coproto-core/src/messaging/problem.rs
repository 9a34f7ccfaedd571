use rst_common::standard::serde::{self, Deserialize, Serialize};

use super::decorators::ThreadDecorator;
use super::message::Message;
use super::types::{Family, MessageError};

pub const PROBLEM_REPORT: &str = "problem_report";

#[derive(Serialize, Deserialize)]
#[serde(crate = "self::serde")]
struct ProblemReportPayload {
    #[serde(rename = "problem-code", default)]
    problem_code: String,

    #[serde(default)]
    explain: String,
}

/// `ProblemReport` is a terminal and structured error exchanged between two
/// parties, it carries a machine-readable problem code and a human explanation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(crate = "self::serde")]
pub struct ProblemReport {
    pub message_type: String,
    pub problem_code: String,
    pub explain: String,
    pub thread_id: Option<String>,
}

impl ProblemReport {
    pub fn new(family: &Family, problem_code: &str, explain: impl Into<String>) -> Self {
        Self {
            message_type: family.message_type(PROBLEM_REPORT),
            problem_code: problem_code.to_string(),
            explain: explain.into(),
            thread_id: None,
        }
    }

    pub fn with_thread_id(mut self, thread_id: Option<String>) -> Self {
        self.thread_id = thread_id;
        self
    }

    pub fn from_message(message: &Message) -> Result<Self, MessageError> {
        let payload: ProblemReportPayload = message.decode()?;
        Ok(Self {
            message_type: message.type_str().to_string(),
            problem_code: payload.problem_code,
            explain: payload.explain,
            thread_id: message.thread().and_then(|thread| thread.thid),
        })
    }

    pub fn to_message(&self) -> Result<Message, MessageError> {
        let mut message = Message::build(
            self.message_type.clone(),
            &ProblemReportPayload {
                problem_code: self.problem_code.clone(),
                explain: self.explain.clone(),
            },
        )?;

        if let Some(thid) = &self.thread_id {
            message.set_thread(&ThreadDecorator::with_thid(thid.clone()));
        }

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rst_common::standard::serde_json::json;

    #[test]
    fn test_problem_report_message() {
        let family = Family::new("issue-credential", "1.1");
        let report = ProblemReport::new(&family, "offer_processing_error", "timeout")
            .with_thread_id(Some("thread-1".to_string()));

        let message = report.to_message().unwrap();
        assert_eq!(
            message.type_str(),
            "https://didcomm.org/issue-credential/1.1/problem_report"
        );
        assert_eq!(message.get("problem-code"), Some(&json!("offer_processing_error")));
        assert_eq!(message.thread_id(), Some("thread-1".to_string()));

        let parsed = ProblemReport::from_message(&message).unwrap();
        assert_eq!(parsed, report)
    }
}

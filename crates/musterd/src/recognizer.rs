//! D-Bus client for the external face recognizer service.
//!
//! The recognizer runs as its own daemon and owns all image decoding and
//! model inference; this client only forwards the validated payload and
//! classifies the reply. Transport failures and timeouts surface as
//! `ServiceUnavailable`; the workflow core never retries them.

use async_trait::async_trait;
use muster_core::types::StationId;
use muster_core::{RecognizeOutcome, Recognizer, WorkflowError, WorkflowResult};
use serde::Deserialize;
use std::time::Duration;

#[zbus::proxy(
    interface = "org.muster.FaceRecognizer1",
    default_service = "org.muster.FaceRecognizer1",
    default_path = "/org/muster/FaceRecognizer1"
)]
trait FaceRecognizer {
    /// JSON reply: `{"matched": bool, "personnel_id": n?, "confidence": x, "message": s?}`.
    async fn recognize(&self, image: &str, station_id: i64) -> zbus::Result<String>;
}

/// Wire shape of one recognizer reply.
#[derive(Debug, Deserialize)]
struct RecognizeReply {
    matched: bool,
    personnel_id: Option<i64>,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    message: Option<String>,
}

pub struct DbusRecognizer {
    proxy: FaceRecognizerProxy<'static>,
    timeout: Duration,
}

impl DbusRecognizer {
    /// Connect to the system bus. The recognizer service itself is looked
    /// up lazily at call time, so it may start after musterd.
    pub async fn connect(timeout: Duration) -> anyhow::Result<Self> {
        let conn = zbus::connection::Builder::system()?.build().await?;
        let proxy = FaceRecognizerProxy::new(&conn).await?;
        Ok(Self { proxy, timeout })
    }
}

#[async_trait]
impl Recognizer for DbusRecognizer {
    async fn recognize(
        &self,
        image: &str,
        station_id: StationId,
    ) -> WorkflowResult<RecognizeOutcome> {
        let raw = tokio::time::timeout(self.timeout, self.proxy.recognize(image, station_id))
            .await
            .map_err(|_| {
                WorkflowError::ServiceUnavailable(format!(
                    "recognizer timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| WorkflowError::ServiceUnavailable(e.to_string()))?;

        let reply: RecognizeReply = serde_json::from_str(&raw).map_err(|e| {
            WorkflowError::ServiceUnavailable(format!("malformed recognizer reply: {e}"))
        })?;

        match (reply.matched, reply.personnel_id) {
            (true, Some(personnel_id)) => Ok(RecognizeOutcome::Match {
                personnel_id,
                confidence: reply.confidence,
            }),
            _ => {
                if let Some(message) = &reply.message {
                    tracing::debug!(station_id, message, "recognizer reported no match");
                }
                Ok(RecognizeOutcome::NoMatch {
                    confidence: reply.confidence,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_parses_match() {
        let reply: RecognizeReply =
            serde_json::from_str(r#"{"matched":true,"personnel_id":10,"confidence":0.93}"#)
                .unwrap();
        assert!(reply.matched);
        assert_eq!(reply.personnel_id, Some(10));
        assert!((reply.confidence - 0.93).abs() < 1e-9);
    }

    #[test]
    fn reply_parses_no_match_with_message() {
        let reply: RecognizeReply = serde_json::from_str(
            r#"{"matched":false,"personnel_id":null,"confidence":0.08,"message":"no face found"}"#,
        )
        .unwrap();
        assert!(!reply.matched);
        assert_eq!(reply.personnel_id, None);
        assert_eq!(reply.message.as_deref(), Some("no face found"));
    }

    #[test]
    fn reply_tolerates_missing_optional_fields() {
        let reply: RecognizeReply = serde_json::from_str(r#"{"matched":false}"#).unwrap();
        assert_eq!(reply.confidence, 0.0);
        assert_eq!(reply.personnel_id, None);
    }
}

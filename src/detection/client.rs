use std::time::Duration;

use serde::Deserialize;

use super::{DetectedBox, DetectionError, DetectionRequest, DetectionResult};

/// Seam between the bridge and whatever answers detection requests.
pub trait DetectionClient: Send + Sync {
    fn detect(&self, request: &DetectionRequest) -> DetectionResult<Vec<DetectedBox>>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DetectionResponse {
    Envelope {
        #[serde(default)]
        status: Option<u16>,
        data: Vec<DetectedBox>,
    },
    Bare(Vec<DetectedBox>),
}

/// Accepts `{"status": 200, "data": [...]}` or a bare array of boxes.
pub fn parse_detection_response(body: &str) -> DetectionResult<Vec<DetectedBox>> {
    match serde_json::from_str::<DetectionResponse>(body)? {
        DetectionResponse::Envelope {
            status: Some(status),
            ..
        } if !(200..300).contains(&status) => Err(DetectionError::Status { status }),
        DetectionResponse::Envelope { data, .. } => Ok(data),
        DetectionResponse::Bare(data) => Ok(data),
    }
}

pub struct HttpDetectionClient {
    endpoint: String,
    http: reqwest::blocking::Client,
}

impl HttpDetectionClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> DetectionResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("uilabel/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl DetectionClient for HttpDetectionClient {
    fn detect(&self, request: &DetectionRequest) -> DetectionResult<Vec<DetectedBox>> {
        tracing::info!(
            endpoint = %self.endpoint,
            width = request.width,
            height = request.height,
            "sending detection request"
        );
        let response = self.http.post(&self.endpoint).json(request).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(DetectionError::Status {
                status: status.as_u16(),
            });
        }
        let body = response.text()?;
        let boxes = parse_detection_response(&body)?;
        tracing::info!(count = boxes.len(), "detection response received");
        Ok(boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Author;

    #[test]
    fn parses_enveloped_response() {
        let body = r#"{
            "status": 200,
            "data": [
                {"value": "button", "label": "Button", "x": 1, "y": 2, "width": 3, "height": 4,
                 "author": "llm", "score": 0.75, "rationale": "looks clickable"}
            ]
        }"#;
        let boxes = parse_detection_response(body).expect("valid envelope");
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].value, "button");
        assert_eq!(boxes[0].width, 3.0);
        assert_eq!(boxes[0].author, Author::Llm);
        assert_eq!(boxes[0].rationale.as_deref(), Some("looks clickable"));
    }

    #[test]
    fn parses_bare_array_and_defaults_author() {
        let body = r#"[{"value": "input", "x": 0, "y": 0, "width": 10, "height": 5, "score": 1}]"#;
        let boxes = parse_detection_response(body).expect("valid array");
        assert_eq!(boxes[0].author, Author::Llm);
        assert!(boxes[0].label.is_empty());
    }

    #[test]
    fn envelope_error_status_is_reported() {
        let body = r#"{"status": 500, "data": []}"#;
        assert!(matches!(
            parse_detection_response(body),
            Err(DetectionError::Status { status: 500 })
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_detection_response("<html>oops</html>"),
            Err(DetectionError::Malformed(_))
        ));
        assert!(matches!(
            parse_detection_response(r#"{"status": 200}"#),
            Err(DetectionError::Malformed(_))
        ));
    }
}

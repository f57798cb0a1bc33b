//! API response types

use action_infer_common::Prediction;
use serde::{Deserialize, Serialize};

/// Successful classification response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    /// Display-formatted action label
    pub action: String,
    /// Confidence as a percentage (0-100, two decimals)
    pub confidence: f64,
    /// Always `"success"`
    pub status: String,
}

impl From<Prediction> for AnalyzeResponse {
    fn from(prediction: Prediction) -> Self {
        Self {
            action: prediction.action,
            confidence: prediction.confidence,
            status: "success".to_string(),
        }
    }
}

/// Structured error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Whether the model loaded at startup
    pub model_available: bool,
    /// Number of class labels loaded
    pub labels: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_response_from_prediction() {
        let prediction = Prediction {
            class_index: 12,
            action: "Air Drumming".to_string(),
            confidence: 87.23,
        };
        let response = AnalyzeResponse::from(prediction);
        assert_eq!(response.action, "Air Drumming");
        assert_eq!(response.confidence, 87.23);
        assert_eq!(response.status, "success");
    }

    #[test]
    fn test_analyze_response_serialization() {
        let response = AnalyzeResponse {
            action: "Walking".to_string(),
            confidence: 98.0,
            status: "success".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"action\":\"Walking\""));
        assert!(json.contains("\"confidence\":98.0"));
        assert!(json.contains("\"status\":\"success\""));
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse {
            error: "Video too short".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, "{\"error\":\"Video too short\"}");
    }
}

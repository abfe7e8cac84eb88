//! Serving boundary for the prediction endpoint.
//!
//! Authenticates the caller, validates the request against the enumerated
//! sets and numeric bounds, then hands the record to the inference service.
//! Transport (HTTP routing, TLS) stays outside; this type maps a token and a
//! decoded body to a response or a status-coded error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::application::{InferenceError, InferenceService};
use crate::domain::{PatientRecord, Prediction};
use crate::ports::{AuthError, IdentityVerifier, OutcomeClassifier};

/// Request body of the prediction endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRequest {
    #[serde(rename = "Age")]
    pub age: u32,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Diagnosis")]
    pub diagnosis: String,
    #[serde(rename = "Symptom_Severity")]
    pub symptom_severity: u32,
    #[serde(rename = "Mood_Score")]
    pub mood_score: u32,
    #[serde(rename = "Sleep_Quality")]
    pub sleep_quality: u32,
    #[serde(rename = "Physical_Activity")]
    pub physical_activity: u32,
    #[serde(rename = "Medication")]
    pub medication: String,
    #[serde(rename = "Therapy_Type")]
    pub therapy_type: String,
    #[serde(rename = "Treatment_Duration")]
    pub treatment_duration: u32,
    #[serde(rename = "Stress_Level")]
    pub stress_level: u32,
    #[serde(rename = "Treatment_Progress")]
    pub treatment_progress: u32,
    #[serde(rename = "Emotional_State")]
    pub emotional_state: String,
    #[serde(rename = "Adherence")]
    pub adherence: u32,
}

impl PredictionRequest {
    #[must_use]
    pub fn into_record(self) -> PatientRecord {
        PatientRecord {
            age: self.age,
            gender: self.gender,
            diagnosis: self.diagnosis,
            symptom_severity: self.symptom_severity,
            mood_score: self.mood_score,
            sleep_quality: self.sleep_quality,
            physical_activity: self.physical_activity,
            medication: self.medication,
            therapy_type: self.therapy_type,
            treatment_duration: self.treatment_duration,
            stress_level: self.stress_level,
            treatment_progress: self.treatment_progress,
            emotional_state: self.emotional_state,
            adherence: self.adherence,
        }
    }
}

/// Errors returned by the prediction endpoint.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("Invalid request: {}", .0.join("; "))]
    InvalidRequest(Vec<String>),

    #[error("Prediction failed: {0}")]
    Inference(#[from] InferenceError),
}

impl EndpointError {
    /// HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized(AuthError::Unavailable(_)) => 503,
            Self::Unauthorized(_) => 401,
            Self::InvalidRequest(_) => 422,
            Self::Inference(e) if e.is_unknown_category() => 422,
            Self::Inference(_) => 500,
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Validate a batch of records and predict the ones that pass.
///
/// Results are in input order. Records failing validation never reach the
/// inference pipeline.
#[must_use]
pub fn predict_validated<M: OutcomeClassifier>(
    service: &InferenceService<M>,
    records: Vec<PatientRecord>,
) -> Vec<Result<Prediction, EndpointError>> {
    let mut results: Vec<Option<Result<Prediction, EndpointError>>> =
        Vec::with_capacity(records.len());
    let mut valid = Vec::new();
    let mut slots = Vec::new();
    for record in records {
        match record.validate() {
            Ok(()) => {
                slots.push(results.len());
                valid.push(record);
                results.push(None);
            }
            Err(errors) => results.push(Some(Err(EndpointError::InvalidRequest(errors)))),
        }
    }

    for (slot, prediction) in slots.into_iter().zip(service.predict_batch(&valid)) {
        results[slot] = Some(prediction.map_err(EndpointError::from));
    }
    results.into_iter().flatten().collect()
}

/// Authenticated prediction endpoint.
pub struct PredictionEndpoint<V, M> {
    verifier: Arc<V>,
    service: InferenceService<M>,
}

impl<V, M> PredictionEndpoint<V, M>
where
    V: IdentityVerifier,
    M: OutcomeClassifier,
{
    pub fn new(verifier: Arc<V>, service: InferenceService<M>) -> Self {
        Self { verifier, service }
    }

    /// Serve one request.
    ///
    /// `authorization` is the raw `Authorization` header, if present.
    ///
    /// # Errors
    /// Returns `EndpointError::Unauthorized` if the token is missing or
    /// rejected, `EndpointError::InvalidRequest` if validation fails, and
    /// `EndpointError::Inference` if the pipeline fails.
    pub fn handle(
        &self,
        authorization: Option<&str>,
        request: PredictionRequest,
    ) -> Result<Prediction, EndpointError> {
        let token = authorization
            .and_then(bearer_token)
            .ok_or(AuthError::MissingToken)?;
        let identity = self.verifier.verify(token)?;

        let record = request.into_record();
        record.validate().map_err(EndpointError::InvalidRequest)?;

        let prediction = self.service.predict(&record).map_err(|e| {
            tracing::warn!("Prediction for {} failed: {}", identity.subject, e);
            e
        })?;
        tracing::info!("Prediction served for {}", identity.subject);
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{stub_pair_parts, StubClassifier};
    use crate::application::ArtifactPair;
    use crate::ports::VerifiedIdentity;

    struct StaticVerifier;

    impl IdentityVerifier for StaticVerifier {
        fn verify(&self, bearer_token: &str) -> Result<VerifiedIdentity, AuthError> {
            match bearer_token {
                "good-token" => Ok(VerifiedIdentity {
                    subject: "clinician-7".into(),
                }),
                "down" => Err(AuthError::Unavailable("timeout".into())),
                _ => Err(AuthError::Rejected("signature".into())),
            }
        }
    }

    fn endpoint() -> PredictionEndpoint<StaticVerifier, StubClassifier> {
        let (encoders, model) = stub_pair_parts(vec![0.72, 0.20, 0.08]);
        let pair = ArtifactPair::new(encoders, model).expect("Should pair");
        PredictionEndpoint::new(
            Arc::new(StaticVerifier),
            InferenceService::new(Arc::new(pair)),
        )
    }

    fn request() -> PredictionRequest {
        serde_json::from_value(serde_json::json!({
            "Age": 34,
            "Gender": "Female",
            "Diagnosis": "Anxiety",
            "Symptom_Severity": 6,
            "Mood_Score": 5,
            "Sleep_Quality": 7,
            "Physical_Activity": 4,
            "Medication": "SSRIs",
            "Therapy_Type": "CBT",
            "Treatment_Duration": 12,
            "Stress_Level": 6,
            "Treatment_Progress": 7,
            "Emotional_State": "Improving",
            "Adherence": 85
        }))
        .expect("Valid request")
    }

    #[test]
    fn test_request_maps_wire_names() {
        let record = request().into_record();
        assert_eq!(record, crate::domain::sample_record());
    }

    #[test]
    fn test_authorized_request_is_served() {
        let prediction = endpoint()
            .handle(Some("Bearer good-token"), request())
            .expect("Should serve");
        assert_eq!(prediction.predicted_outcome, "Improved");
        assert!((prediction.confidence - 72.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_or_rejected_token() {
        let endpoint = endpoint();

        let err = endpoint.handle(None, request()).expect_err("No header");
        assert!(matches!(err, EndpointError::Unauthorized(AuthError::MissingToken)));
        assert_eq!(err.status_code(), 401);

        let err = endpoint
            .handle(Some("Basic Zm9vOmJhcg=="), request())
            .expect_err("Wrong scheme");
        assert_eq!(err.status_code(), 401);

        let err = endpoint
            .handle(Some("Bearer forged"), request())
            .expect_err("Rejected");
        assert!(matches!(err, EndpointError::Unauthorized(AuthError::Rejected(_))));

        let err = endpoint
            .handle(Some("Bearer down"), request())
            .expect_err("Provider down");
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn test_invalid_request_is_422() {
        let mut req = request();
        req.mood_score = 11;
        req.medication = "Aspirin".into();

        let err = endpoint()
            .handle(Some("Bearer good-token"), req)
            .expect_err("Invalid");
        match &err {
            EndpointError::InvalidRequest(errors) => assert_eq!(errors.len(), 2),
            other => panic!("Expected InvalidRequest, got {other:?}"),
        }
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn test_unknown_category_is_422() {
        let mut req = request();
        // Accepted by the boundary, absent from the fitted vocabulary
        req.gender = "Other".into();

        let err = endpoint()
            .handle(Some("Bearer good-token"), req)
            .expect_err("Unknown category");
        assert!(matches!(err, EndpointError::Inference(_)));
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn test_batch_skips_invalid_records() {
        let (encoders, model) = stub_pair_parts(vec![0.72, 0.20, 0.08]);
        let pair = ArtifactPair::new(encoders, model).expect("Should pair");
        let service = InferenceService::new(Arc::new(pair));

        let mut out_of_range = request();
        out_of_range.mood_score = 11;
        let mut unfitted = request();
        unfitted.gender = "Other".into();
        let records = vec![
            request().into_record(),
            out_of_range.into_record(),
            unfitted.into_record(),
            request().into_record(),
        ];

        let results = predict_validated(&service, records);
        assert_eq!(results.len(), 4);
        assert_eq!(
            results[0].as_ref().expect("First ok").predicted_outcome,
            "Improved"
        );
        assert!(matches!(results[1], Err(EndpointError::InvalidRequest(_))));
        assert!(matches!(results[2], Err(EndpointError::Inference(_))));
        assert!(results[3].is_ok());
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer   abc "), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Token abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }
}

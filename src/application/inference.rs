//! Prediction service: raw fields in, formatted risk out.
//!
//! Each request moves through the stages in [`Stage`] order:
//! - Validate the raw fields into a [`ClinicalRecord`]
//! - Derive features through the [`FeatureDeriver`]
//! - Align the derived row to the model's [`FeatureSchema`]
//! - Score with the [`Predictor`] and format the result
//!
//! A failure at any stage stops the request; later stages never run.

use std::path::Path;
use std::sync::Arc;

use crate::adapters::gbdt::GbdtClassifier;
use crate::adapters::sqlite::SqliteDeriver;
use crate::adapters::Artifacts;
use crate::application::{Predictor, Stage, POSITIVE_LABEL};
use crate::domain::{ClinicalRecord, FeatureSchema, RawInput, RiskAssessment, RiskThreshold};
use crate::ports::{Classifier, FeatureDeriver};
use crate::HfriskError;

/// Stateless prediction pipeline shared across requests.
pub struct PredictionService<D, C>
where
    D: FeatureDeriver,
    C: Classifier,
{
    deriver: Arc<D>,
    schema: FeatureSchema,
    predictor: Predictor<C>,
}

impl<D, C> PredictionService<D, C>
where
    D: FeatureDeriver,
    C: Classifier,
{
    pub fn new(deriver: Arc<D>, schema: FeatureSchema, predictor: Predictor<C>) -> Self {
        Self {
            deriver,
            schema,
            predictor,
        }
    }

    /// Run the full pipeline for one request.
    ///
    /// # Errors
    /// Returns [`HfriskError::Validation`] for bad input, and the derivation,
    /// alignment or model error of the stage that failed otherwise.
    pub fn predict(&self, raw: &RawInput) -> crate::Result<RiskAssessment> {
        self.run(raw)
            .inspect(|assessment| tracing::info!("Prediction completed: {}", assessment.level))
            .inspect_err(|e| {
                let stage = e
                    .failed_stage()
                    .map_or_else(|| "startup".to_string(), |s| s.to_string());
                tracing::warn!("Prediction failed at {}: {}", stage, e);
            })
    }

    /// Like [`predict`](Self::predict), rendered as `"{p:.1}% — {label}"`.
    ///
    /// # Errors
    /// See [`predict`](Self::predict).
    pub fn predict_text(&self, raw: &RawInput) -> crate::Result<String> {
        self.predict(raw).map(|assessment| assessment.to_string())
    }

    fn run(&self, raw: &RawInput) -> Result<RiskAssessment, HfriskError> {
        tracing::debug!("Stage {}: {} fields", Stage::ReceivedRaw, raw.len());

        let record = ClinicalRecord::validate(raw)?;
        tracing::debug!("Stage {}", Stage::Validated);

        let derived = self.deriver.derive(&record)?;
        tracing::debug!("Stage {}: {} columns", Stage::Derived, derived.len());

        let aligned = self.schema.align(&derived)?;
        tracing::debug!("Stage {}: {} features", Stage::Aligned, aligned.len());

        let assessment = self.predictor.score(&aligned)?;
        tracing::debug!("Stage {}: {}", Stage::Scored, assessment.level);

        tracing::debug!("Stage {}", Stage::Formatted);
        Ok(assessment)
    }
}

impl PredictionService<SqliteDeriver, GbdtClassifier> {
    /// Load the production pipeline from an artifact directory.
    ///
    /// # Errors
    /// Returns error if the artifacts fail verification or loading, or the
    /// SQL views cannot be created.
    pub fn from_artifacts(dir: &Path) -> crate::Result<Self> {
        tracing::info!("Loading artifacts from {:?}", dir);
        let Artifacts { model, schema } = Artifacts::load(dir)?;

        let deriver = SqliteDeriver::new()?;
        let produced = deriver.output_columns()?;
        let uncovered: Vec<&str> = schema
            .columns()
            .iter()
            .filter(|c| !produced.contains(*c))
            .map(String::as_str)
            .collect();
        if !uncovered.is_empty() {
            // Requests will fail at alignment until the views and model agree.
            tracing::warn!(
                "Derivation does not produce model features: {}",
                uncovered.join(", ")
            );
        }

        let predictor = Predictor::new(Arc::new(model), POSITIVE_LABEL, RiskThreshold::default())?;
        tracing::info!(
            "Prediction service ready ({} features, threshold {})",
            schema.len(),
            predictor.threshold().value()
        );

        Ok(Self::new(Arc::new(deriver), schema, predictor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::predictor::tests::FixedModel;
    use crate::domain::{reference_input, FeatureRow, RawValue};
    use crate::ports::DerivationError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deriver returning a canned row and counting calls.
    struct StubDeriver {
        row: FeatureRow,
        calls: AtomicUsize,
        fail: bool,
    }

    impl StubDeriver {
        fn new(row: FeatureRow) -> Self {
            Self {
                row,
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(FeatureRow::new())
            }
        }
    }

    impl FeatureDeriver for StubDeriver {
        fn derive(&self, _record: &ClinicalRecord) -> Result<FeatureRow, DerivationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DerivationError::RowCount(0));
            }
            Ok(self.row.clone())
        }
    }

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec!["age".into(), "ef_to_creatinine".into()]).expect("Valid schema")
    }

    fn full_row() -> FeatureRow {
        [("age", Some(60.0)), ("ef_to_creatinine", Some(35.0 / 1.1))]
            .into_iter()
            .collect()
    }

    fn service(
        deriver: Arc<StubDeriver>,
        proba: Vec<f64>,
    ) -> PredictionService<StubDeriver, FixedModel> {
        let model = Arc::new(FixedModel::new(vec![0, 1], proba));
        let predictor =
            Predictor::new(model, POSITIVE_LABEL, RiskThreshold::default()).expect("Should build");
        PredictionService::new(deriver, schema(), predictor)
    }

    #[test]
    fn test_fixed_model_formats_low_risk() {
        let deriver = Arc::new(StubDeriver::new(full_row()));
        let service = service(Arc::clone(&deriver), vec![0.55, 0.45]);

        let text = service.predict_text(&reference_input()).expect("Should predict");
        assert_eq!(text, "45.0% — Low risk");
        assert_eq!(deriver.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_indicator_stops_before_derivation() {
        let deriver = Arc::new(StubDeriver::new(full_row()));
        let service = service(Arc::clone(&deriver), vec![0.55, 0.45]);

        let mut raw = reference_input();
        raw.insert("sex".into(), RawValue::Int(2));

        let err = service.predict(&raw).expect_err("Should reject");
        assert!(err.is_user_error());
        assert_eq!(err.failed_stage(), Some(Stage::ReceivedRaw));
        assert!(err.to_string().starts_with("sex:"), "got {err}");
        assert_eq!(deriver.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_derived_column_is_named() {
        let row: FeatureRow = [("age", Some(60.0))].into_iter().collect();
        let service = service(Arc::new(StubDeriver::new(row)), vec![0.55, 0.45]);

        let err = service.predict(&reference_input()).expect_err("Should fail");
        assert!(!err.is_user_error());
        assert_eq!(err.failed_stage(), Some(Stage::Derived));
        assert_eq!(
            err.to_string(),
            "Missing required features: ef_to_creatinine"
        );
    }

    #[test]
    fn test_derivation_failure_reports_stage() {
        let service = service(Arc::new(StubDeriver::failing()), vec![0.55, 0.45]);

        let err = service.predict(&reference_input()).expect_err("Should fail");
        assert!(matches!(err, HfriskError::Derivation(_)));
        assert_eq!(err.failed_stage(), Some(Stage::Validated));
    }

    #[test]
    fn test_model_failure_reports_stage() {
        let service = service(Arc::new(StubDeriver::new(full_row())), vec![0.5]);

        let err = service.predict(&reference_input()).expect_err("Should fail");
        assert!(matches!(err, HfriskError::ModelInvocation(_)));
        assert_eq!(err.failed_stage(), Some(Stage::Aligned));
    }

    #[test]
    fn test_bundled_artifacts_end_to_end() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("artifacts");
        let service = PredictionService::from_artifacts(&dir).expect("Should load");

        let assessment = service.predict(&reference_input()).expect("Should predict");
        assert!((assessment.probability - 0.20587).abs() < 1e-4);
        assert_eq!(assessment.to_string(), "20.6% — Low risk");

        let again = service.predict_text(&reference_input()).expect("Should predict");
        assert_eq!(again, "20.6% — Low risk");
    }

    #[test]
    fn test_bundled_artifacts_reject_bad_input() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("artifacts");
        let service = PredictionService::from_artifacts(&dir).expect("Should load");

        let mut raw = reference_input();
        raw.remove("serum_sodium");
        let err = service.predict(&raw).expect_err("Should reject");
        assert_eq!(err.to_string(), "serum_sodium: field required");
    }
}

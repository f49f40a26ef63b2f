//! Engine facade: training pipelines, inference entry points and trace
//! lookup over one consistent model snapshot.
//!
//! Inference loads the current [`ModelSnapshot`] without locking; training
//! builds new models, persists them through the [`ModelRegistry`] and only
//! then swaps them in, so a request sees either the old or the new
//! generation, never a mix.
//!
//! # Example
//!
//! ```
//! use sizewise::engine::{Collaborators, Engine};
//! use sizewise::config::EngineConfig;
//! use sizewise::profile::RawProfileInput;
//!
//! let engine = Engine::new(EngineConfig::default(), Collaborators::in_memory(Vec::new()))
//!     .expect("default config is valid");
//! let profile = engine
//!     .normalize(&RawProfileInput::new("F", 13, 152.0, 44.0))
//!     .expect("valid profile");
//!
//! let prediction = engine
//!     .predict_measurement("girls_skirt", "waist_cm", &profile, None)
//!     .expect("served by a rule");
//! assert_eq!(prediction.method, "garment_rule:skirt_waist_ease");
//!
//! let trace = engine.get_explanation(prediction.decision_id).expect("recorded");
//! assert_eq!(trace.method(), Some("garment_rule:skirt_waist_ease"));
//! ```

mod report;

pub use report::{
    GarmentRecommendation, LoadReport, ModelTrainingSummary, ProfileRecommendation, SkippedModel, TrainingReport,
    TrainingStatus,
};

use crate::collaborators::{
    DataSource, FeedbackSink, GarmentCatalog, InMemoryDataSource, InMemoryGarmentCatalog, RuleFunction,
    SizeLookup, StaticSizeLookup, TableRuleFunction, TraceStore,
};
use crate::config::{EngineConfig, MODEL_VERSION};
use crate::dataset::{CorpusBuilder, DatasetBalancer, FeedbackRecord, FitFeedback, HistoricalRecord};
use crate::error::{Result, SizewiseError};
use crate::explain::{DecisionType, ExplanationRecorder, ExplanationTrace};
use crate::policy::{DecisionPolicy, MeasurementPrediction, SizeRecommendation, Tier};
use crate::profile::{Profile, ProfileNormalizer, RawProfileInput};
use crate::registry::{BlobStore, MemoryBlobStore, ModelMetadata, ModelRegistry};
use crate::regression_bank::{model_key, GarmentPrediction, RegressionBank};
use crate::size_classifier::{ModelScope, SizeClassifier, SizeEnsemble, SizeLadder};
use arc_swap::ArcSwap;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Registry name of the measurement regression bank.
pub const MEASUREMENT_BANK_NAME: &str = "measurement_regression_bank";

/// Models served by inference at one point in time.
#[derive(Debug, Clone, Default)]
pub struct ModelSnapshot {
    /// Size ensembles, if any scope is trained
    pub size: Option<Arc<SizeClassifier>>,
    /// Measurement regressors, if any pair is trained
    pub measurements: Option<Arc<RegressionBank>>,
}

/// External systems the engine consumes.
#[derive(Clone)]
pub struct Collaborators {
    /// Labeled history for training
    pub data_source: Arc<dyn DataSource>,
    /// Fit feedback intake
    pub feedback_sink: Arc<dyn FeedbackSink>,
    /// Size code to catalog id
    pub size_lookup: Arc<dyn SizeLookup>,
    /// Deterministic baseline
    pub rule_function: Arc<dyn RuleFunction>,
    /// Garments and their measures
    pub garment_catalog: Arc<dyn GarmentCatalog>,
    /// Trace persistence; `None` keeps traces in memory only
    pub trace_store: Option<Arc<dyn TraceStore>>,
    /// Model blob storage
    pub blob_store: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("trace_store", &self.trace_store.is_some())
            .finish_non_exhaustive()
    }
}

impl Collaborators {
    /// Process-local collaborators over a record set. Feedback is applied
    /// to the same records.
    #[must_use]
    pub fn in_memory(records: Vec<HistoricalRecord>) -> Self {
        let source = Arc::new(InMemoryDataSource::new(records));
        Self {
            data_source: source.clone(),
            feedback_sink: source,
            size_lookup: Arc::new(StaticSizeLookup::from_ladder(&SizeLadder::default())),
            rule_function: Arc::new(TableRuleFunction::default()),
            garment_catalog: Arc::new(InMemoryGarmentCatalog::default()),
            trace_store: None,
            blob_store: Arc::new(MemoryBlobStore::new()),
        }
    }

    /// Replace the training record source.
    #[must_use]
    pub fn with_data_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.data_source = source;
        self
    }

    /// Replace the fit feedback intake.
    #[must_use]
    pub fn with_feedback_sink(mut self, sink: Arc<dyn FeedbackSink>) -> Self {
        self.feedback_sink = sink;
        self
    }

    /// Replace the size id lookup.
    #[must_use]
    pub fn with_size_lookup(mut self, lookup: Arc<dyn SizeLookup>) -> Self {
        self.size_lookup = lookup;
        self
    }

    /// Replace the deterministic rule function.
    #[must_use]
    pub fn with_rule_function(mut self, rule_function: Arc<dyn RuleFunction>) -> Self {
        self.rule_function = rule_function;
        self
    }

    /// Replace the garment catalog.
    #[must_use]
    pub fn with_garment_catalog(mut self, catalog: Arc<dyn GarmentCatalog>) -> Self {
        self.garment_catalog = catalog;
        self
    }

    /// Persist traces to `store`.
    #[must_use]
    pub fn with_trace_store(mut self, store: Arc<dyn TraceStore>) -> Self {
        self.trace_store = Some(store);
        self
    }

    /// Replace model blob storage.
    #[must_use]
    pub fn with_blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = store;
        self
    }
}

/// Anthropometric inference engine.
pub struct Engine {
    config: EngineConfig,
    normalizer: ProfileNormalizer,
    balancer: DatasetBalancer,
    policy: DecisionPolicy,
    registry: ModelRegistry,
    recorder: ExplanationRecorder,
    data_source: Arc<dyn DataSource>,
    feedback_sink: Arc<dyn FeedbackSink>,
    catalog: Arc<dyn GarmentCatalog>,
    models: ArcSwap<ModelSnapshot>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.models.load();
        f.debug_struct("Engine")
            .field("size_models", &snapshot.size.as_ref().map(|c| c.scopes().count()))
            .field("measurement_models", &snapshot.measurements.as_ref().map(|b| b.len()))
            .field("recorder", &self.recorder)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Builds an engine with no models loaded.
    ///
    /// # Errors
    ///
    /// `Config` if the configuration is inconsistent.
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let recorder = match collaborators.trace_store {
            Some(store) => ExplanationRecorder::with_store(store),
            None => ExplanationRecorder::in_memory(),
        }
        .with_capacity(config.recorder.max_in_memory_traces);
        let policy = DecisionPolicy::new(
            config.policy.clone(),
            config.rules.clone(),
            collaborators.rule_function,
            collaborators.size_lookup,
        );
        Ok(Self {
            normalizer: ProfileNormalizer::new(config.normalizer.clone()),
            balancer: DatasetBalancer::new(config.balancer.clone()),
            policy,
            registry: ModelRegistry::new(collaborators.blob_store),
            recorder,
            data_source: collaborators.data_source,
            feedback_sink: collaborators.feedback_sink,
            catalog: collaborators.garment_catalog,
            models: ArcSwap::from_pointee(ModelSnapshot::default()),
            config,
        })
    }

    /// Builds an engine and serves whatever the registry already holds.
    ///
    /// # Errors
    ///
    /// As [`Engine::new`]. Registry problems are reported, not raised.
    pub fn open(config: EngineConfig, collaborators: Collaborators) -> Result<(Self, LoadReport)> {
        let engine = Self::new(config, collaborators)?;
        let report = engine.load_models();
        Ok((engine, report))
    }

    /// Makes `tier` fail on every request; used to exercise demotion.
    #[must_use]
    pub fn with_disabled_tier(mut self, tier: Tier) -> Self {
        self.policy = self.policy.with_disabled_tier(tier);
        self
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Model registry the engine saves to and loads from.
    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Explanation recorder.
    #[must_use]
    pub fn recorder(&self) -> &ExplanationRecorder {
        &self.recorder
    }

    /// Models currently served.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ModelSnapshot> {
        self.models.load_full()
    }

    /// Replaces the served models with the latest registry versions.
    ///
    /// Names without an entry are listed as missing; entries failing their
    /// checksum are listed as failed and never served.
    pub fn load_models(&self) -> LoadReport {
        let mut report = LoadReport::default();

        let mut classifier = SizeClassifier::new(self.config.classifier.clone());
        for scope in ModelScope::ALL {
            match self.registry.load::<SizeEnsemble>(scope.registry_name()) {
                Ok((model, entry)) => {
                    classifier.insert_model(scope, model);
                    report.loaded.push(entry);
                }
                Err(err) => report.record_failure(scope.registry_name(), &err),
            }
        }

        let measurements = match self.registry.load::<RegressionBank>(MEASUREMENT_BANK_NAME) {
            Ok((bank, entry)) => {
                report.loaded.push(entry);
                Some(Arc::new(bank))
            }
            Err(err) => {
                report.record_failure(MEASUREMENT_BANK_NAME, &err);
                None
            }
        };

        self.models.store(Arc::new(ModelSnapshot {
            size: (!classifier.is_empty()).then(|| Arc::new(classifier)),
            measurements,
        }));
        tracing::info!(
            loaded = report.loaded.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "models loaded from registry"
        );
        report
    }

    /// Validates raw input and derives missing measurements.
    ///
    /// # Errors
    ///
    /// `BoundsViolation`, `UnsupportedGender` or `InvalidInput`.
    pub fn normalize(&self, input: &RawProfileInput) -> Result<Profile> {
        self.normalizer.normalize(input)
    }

    /// Trains the per-gender size ensembles from the data source.
    ///
    /// Each trained scope is saved to the registry before it is served; a
    /// scope that fails to train or to save keeps its previous model.
    ///
    /// # Errors
    ///
    /// `CollaboratorUnavailable` if the data source cannot be read.
    #[tracing::instrument(skip(self))]
    pub fn train_size_models(&self) -> Result<TrainingReport> {
        let records = self.data_source.historical_records()?;
        let corpus = CorpusBuilder::new(&self.normalizer, &self.config.weighting).size_corpus(&records);
        let mut report = TrainingReport::new(corpus.rejected.len());
        if corpus.examples.is_empty() {
            tracing::warn!(records = records.len(), "no usable size examples");
            return Ok(report.finish());
        }

        let balanced = self.balancer.balance(corpus.examples);
        report.balance = balanced.stages;

        let mut classifier = SizeClassifier::new(self.config.classifier.clone());
        let outcome = classifier.train(&balanced.examples);
        for skipped in outcome.skipped {
            report.skip(skipped.scope.registry_name(), skipped.reason);
        }

        let mut fresh = Vec::new();
        for scope in ModelScope::ALL {
            let Some(model) = classifier.model(scope) else {
                continue;
            };
            let metrics = model.metrics();
            let n_samples = metrics.n_train + metrics.n_calibration;
            let mut metadata = ModelMetadata::new("size_ensemble")
                .with_version(MODEL_VERSION)
                .with_samples(n_samples)
                .with_metric("temperature", metrics.temperature)
                .with_custom("classes", metrics.classes.join(","));
            for (key, value) in [
                ("holdout_accuracy", metrics.holdout_accuracy),
                ("ece_after", metrics.ece_after),
                ("forest_cv_accuracy", metrics.forest_cv_accuracy),
                ("softmax_cv_accuracy", metrics.softmax_cv_accuracy),
            ] {
                if let Some(value) = value {
                    metadata = metadata.with_metric(key, value);
                }
            }

            match self.registry.save(scope.registry_name(), model, metadata.clone()) {
                Ok(entry) => {
                    report.models.push(ModelTrainingSummary {
                        name: scope.registry_name().to_string(),
                        model_type: metadata.model_type,
                        n_samples,
                        metrics: metadata.metrics,
                        registry_version: entry.version,
                    });
                    fresh.push((scope, model.clone()));
                }
                Err(err) => {
                    tracing::error!(model = scope.registry_name(), error = %err, "size model not persisted");
                    report.skip(scope.registry_name(), err.to_string());
                }
            }
        }

        if !fresh.is_empty() {
            self.models.rcu(|current| {
                let mut merged = current
                    .size
                    .as_deref()
                    .cloned()
                    .unwrap_or_else(|| SizeClassifier::new(self.config.classifier.clone()));
                for (scope, model) in &fresh {
                    merged.insert_model(*scope, model.clone());
                }
                ModelSnapshot {
                    size: Some(Arc::new(merged)),
                    measurements: current.measurements.clone(),
                }
            });
        }

        let report = report.finish();
        tracing::info!(
            status = ?report.status,
            trained = report.models.len(),
            skipped = report.skipped.len(),
            "size training finished"
        );
        Ok(report)
    }

    /// Trains one regressor per (garment, measure) pair from the data
    /// source and serves the bank once it is saved.
    ///
    /// # Errors
    ///
    /// `CollaboratorUnavailable` if the data source cannot be read.
    #[tracing::instrument(skip(self))]
    pub fn train_measurement_models(&self) -> Result<TrainingReport> {
        let records = self.data_source.historical_records()?;
        let corpus = CorpusBuilder::new(&self.normalizer, &self.config.weighting).measurement_corpus(&records);
        let mut report = TrainingReport::new(corpus.rejected.len());
        if corpus.examples.is_empty() {
            tracing::warn!(records = records.len(), "no usable measurement examples");
            return Ok(report.finish());
        }

        let mut bank = RegressionBank::new(self.config.regression.clone());
        let outcome = bank.train(&corpus.examples);
        for skipped in outcome.skipped {
            report.skip(skipped.key, skipped.reason);
        }
        if bank.is_empty() {
            return Ok(report.finish());
        }

        let metadata = ModelMetadata::new("regression_bank")
            .with_version(MODEL_VERSION)
            .with_samples(corpus.examples.len())
            .with_custom("pairs", bank.len().to_string());
        match self.registry.save(MEASUREMENT_BANK_NAME, &bank, metadata) {
            Ok(entry) => {
                for metrics in outcome.trained {
                    report.models.push(ModelTrainingSummary {
                        name: model_key(&metrics.garment, &metrics.measure),
                        model_type: metrics.model_type.to_string(),
                        n_samples: metrics.n_samples,
                        metrics: BTreeMap::from([
                            ("rmse".to_string(), metrics.rmse),
                            ("cv_mse".to_string(), metrics.cv_mse),
                        ]),
                        registry_version: entry.version,
                    });
                }
                let bank = Arc::new(bank);
                self.models.rcu(|current| ModelSnapshot {
                    size: current.size.clone(),
                    measurements: Some(Arc::clone(&bank)),
                });
            }
            Err(err) => {
                tracing::error!(model = MEASUREMENT_BANK_NAME, error = %err, "measurement bank not persisted");
                for metrics in outcome.trained {
                    report.skip(model_key(&metrics.garment, &metrics.measure), err.to_string());
                }
            }
        }

        let report = report.finish();
        tracing::info!(
            status = ?report.status,
            trained = report.models.len(),
            skipped = report.skipped.len(),
            "measurement training finished"
        );
        Ok(report)
    }

    /// Recommends a size and records the decision trace.
    ///
    /// # Errors
    ///
    /// `AllTiersExhausted` when no tier can serve the profile. The trace of
    /// the failed decision is still recorded.
    #[tracing::instrument(skip(self, profile), fields(gender = profile.gender().code(), age = profile.age()))]
    pub fn recommend_size(&self, profile: &Profile, session_id: Option<&str>) -> Result<SizeRecommendation> {
        let snapshot = self.models.load_full();
        let mut trace = ExplanationTrace::new(DecisionType::Size, session_id.map(str::to_string));
        let result = self.policy.recommend_size(snapshot.size.as_deref(), profile, &mut trace);
        self.recorder.record(trace);
        result
    }

    /// Predicts one garment measurement and records the decision trace.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a meaningless override; `AllTiersExhausted` when
    /// no tier can serve the pair.
    #[tracing::instrument(skip(self, profile))]
    pub fn predict_measurement(
        &self,
        garment: &str,
        measure: &str,
        profile: &Profile,
        manual_override: Option<f32>,
    ) -> Result<MeasurementPrediction> {
        self.predict_measurement_in_session(garment, measure, profile, manual_override, None)
    }

    fn predict_measurement_in_session(
        &self,
        garment: &str,
        measure: &str,
        profile: &Profile,
        manual_override: Option<f32>,
        session_id: Option<&str>,
    ) -> Result<MeasurementPrediction> {
        let snapshot = self.models.load_full();
        let mut trace = ExplanationTrace::new(DecisionType::Measurement, session_id.map(str::to_string));
        let result = self.policy.predict_measurement(
            snapshot.measurements.as_deref(),
            garment,
            measure,
            profile,
            manual_override,
            &mut trace,
        );
        self.recorder.record(trace);
        result
    }

    /// Runs the trained regressors for every catalog measure of a garment.
    ///
    /// Unlike [`Engine::predict_measurement`] this bypasses the fallback
    /// chain and reports per-measure failures instead.
    ///
    /// # Errors
    ///
    /// `ModelNotFound` if no measurement models are served;
    /// `CollaboratorUnavailable` if the catalog cannot be read.
    pub fn predict_garment(&self, garment: &str, profile: &Profile) -> Result<GarmentPrediction> {
        let snapshot = self.models.load_full();
        let bank = snapshot.measurements.as_deref().ok_or_else(|| SizewiseError::ModelNotFound {
            key: MEASUREMENT_BANK_NAME.to_string(),
        })?;
        let measures = self.catalog.measures(garment)?;
        Ok(bank.predict_garment(garment, &measures, profile))
    }

    /// Fetches a recorded trace.
    ///
    /// # Errors
    ///
    /// `TraceNotFound` for an unknown id.
    pub fn get_explanation(&self, decision_id: Uuid) -> Result<ExplanationTrace> {
        self.recorder.get(decision_id)
    }

    /// Validates fit feedback on one issued garment and forwards it to the
    /// feedback sink. The rating reaches models at the next training run.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank profile reference, a garment unknown to
    /// the catalog or malformed feedback; sink failures are propagated.
    #[tracing::instrument(skip(self, feedback), fields(rating = ?feedback.fit_rating))]
    pub fn record_fit_feedback(&self, profile_ref: &str, garment: &str, feedback: FitFeedback) -> Result<FeedbackRecord> {
        if profile_ref.trim().is_empty() {
            return Err(SizewiseError::InvalidInput("profile_ref must not be empty".to_string()));
        }
        if self.catalog.measures(garment)?.is_empty() {
            return Err(SizewiseError::InvalidInput(format!("unknown garment {garment:?}")));
        }
        feedback.validate()?;

        let record = FeedbackRecord {
            profile_ref: profile_ref.to_string(),
            garment: garment.to_string(),
            feedback,
            received_at: Utc::now(),
        };
        self.feedback_sink.record_feedback(&record)?;
        tracing::info!("fit feedback recorded");
        Ok(record)
    }

    /// Size plus measurements for every catalog garment of the profile's
    /// gender, all traced under one session.
    ///
    /// A measure that no tier can serve is listed under the garment's
    /// failures; the bundle still succeeds.
    ///
    /// # Errors
    ///
    /// Size errors, or `CollaboratorUnavailable` if the catalog is down.
    #[tracing::instrument(skip(self, profile), fields(gender = profile.gender().code()))]
    pub fn recommend_profile(
        &self,
        profile: &Profile,
        include_sports: bool,
        session_id: Option<&str>,
    ) -> Result<ProfileRecommendation> {
        let session_id = session_id.map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
        let size = self.recommend_size(profile, Some(&session_id))?;

        let mut garments = Vec::new();
        for garment in self.catalog.garments(profile.gender(), include_sports)? {
            let mut entry = GarmentRecommendation {
                garment: garment.clone(),
                measurements: BTreeMap::new(),
                failures: BTreeMap::new(),
            };
            for measure in self.catalog.measures(&garment)? {
                match self.predict_measurement_in_session(&garment, &measure, profile, None, Some(&session_id)) {
                    Ok(prediction) => {
                        entry.measurements.insert(measure, prediction);
                    }
                    Err(err) => {
                        tracing::warn!(garment = %garment, measure = %measure, error = %err, "measurement not served");
                        entry.failures.insert(measure, err.to_string());
                    }
                }
            }
            garments.push(entry);
        }

        Ok(ProfileRecommendation {
            session_id,
            size,
            garments,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;

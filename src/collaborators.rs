//! External collaborators consumed by the engine.
//!
//! The engine never owns data sources, size tables, rule functions, trace
//! storage or the garment catalog; it reaches them through these traits.
//! The in-memory implementations serve tests, demos and deployments that
//! configure everything from static tables.

use crate::config::DEFAULT_RULE_CONFIDENCE;
use crate::dataset::{FeedbackRecord, HistoricalRecord};
use crate::error::{Result, SizewiseError};
use crate::explain::{DecisionType, ExplanationTrace};
use crate::profile::{Gender, MeasureField, Profile};
use crate::size_classifier::SizeLadder;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Source of labeled historical records.
pub trait DataSource: Send + Sync {
    /// All records available for training.
    ///
    /// # Errors
    ///
    /// `CollaboratorUnavailable` if the source cannot be read.
    fn historical_records(&self) -> Result<Vec<HistoricalRecord>>;
}

/// Receives validated fit feedback for later training runs.
pub trait FeedbackSink: Send + Sync {
    /// Stores one piece of feedback.
    ///
    /// # Errors
    ///
    /// `CollaboratorUnavailable` if the feedback cannot be stored.
    fn record_feedback(&self, feedback: &FeedbackRecord) -> Result<()>;
}

/// Resolves size codes to numeric identifiers.
pub trait SizeLookup: Send + Sync {
    /// Identifier of `size_code` for `gender`, or `None` if the code is unknown.
    ///
    /// # Errors
    ///
    /// `CollaboratorUnavailable` if the lookup cannot be served.
    fn size_id(&self, gender: Gender, size_code: &str) -> Result<Option<i64>>;
}

/// Baseline size from the deterministic rule function.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleFunctionSize {
    /// Recommended size code
    pub size_code: String,
    /// Confidence, if the function reports one
    pub confidence: Option<f32>,
}

/// Deterministic, table-driven baseline calculations.
pub trait RuleFunction: Send + Sync {
    /// Baseline size for a profile.
    ///
    /// # Errors
    ///
    /// `CollaboratorUnavailable` if the function cannot be evaluated.
    fn recommend_size(&self, profile: &Profile) -> Result<RuleFunctionSize>;

    /// Baseline value for one garment measure, or `None` if the function
    /// has no formula for it.
    ///
    /// # Errors
    ///
    /// `CollaboratorUnavailable` if the function cannot be evaluated.
    fn autofill_measure(&self, garment: &str, measure: &str, profile: &Profile) -> Result<Option<f32>>;
}

/// Persistence for explanation traces.
pub trait TraceStore: Send + Sync {
    /// Persists a trace.
    ///
    /// # Errors
    ///
    /// `CollaboratorUnavailable` or `Io` if the trace cannot be written.
    fn save(&self, trace: &ExplanationTrace) -> Result<()>;

    /// Loads a trace by decision id.
    ///
    /// # Errors
    ///
    /// `CollaboratorUnavailable`, `Io` or `Serialization` on read failure.
    fn load(&self, decision_id: Uuid) -> Result<Option<ExplanationTrace>>;
}

/// Which garments exist and which measures each needs.
pub trait GarmentCatalog: Send + Sync {
    /// Garment codes for a gender.
    ///
    /// # Errors
    ///
    /// `CollaboratorUnavailable` if the catalog cannot be read.
    fn garments(&self, gender: Gender, include_sports: bool) -> Result<Vec<String>>;

    /// Measure names relevant to a garment (empty if none).
    ///
    /// # Errors
    ///
    /// `CollaboratorUnavailable` if the catalog cannot be read.
    fn measures(&self, garment: &str) -> Result<Vec<String>>;
}

/// Records held in memory.
///
/// Also a [`FeedbackSink`]: feedback sets `fit_rating` on the matching
/// records of the profile, so the next training run weights them by it.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    records: RwLock<Vec<HistoricalRecord>>,
    feedback: RwLock<Vec<FeedbackRecord>>,
}

impl InMemoryDataSource {
    /// Wraps records.
    #[must_use]
    pub fn new(records: Vec<HistoricalRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            feedback: RwLock::new(Vec::new()),
        }
    }

    /// Feedback received so far, oldest first.
    #[must_use]
    pub fn feedback(&self) -> Vec<FeedbackRecord> {
        self.feedback.read().clone()
    }
}

impl DataSource for InMemoryDataSource {
    fn historical_records(&self) -> Result<Vec<HistoricalRecord>> {
        Ok(self.records.read().clone())
    }
}

impl FeedbackSink for InMemoryDataSource {
    fn record_feedback(&self, feedback: &FeedbackRecord) -> Result<()> {
        let mut rated = 0;
        for record in self.records.write().iter_mut() {
            if record.is_rated_by(&feedback.profile_ref, &feedback.garment) {
                record.fit_rating = Some(feedback.feedback.fit_rating);
                rated += 1;
            }
        }
        tracing::debug!(
            profile_ref = %feedback.profile_ref,
            garment = %feedback.garment,
            rated,
            "fit feedback applied to in-memory records"
        );
        self.feedback.write().push(feedback.clone());
        Ok(())
    }
}

/// Size ids from a static table.
#[derive(Debug, Clone, Default)]
pub struct StaticSizeLookup {
    ids: HashMap<(Gender, String), i64>,
}

impl StaticSizeLookup {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Numbers every ladder size per gender: boys from 1, girls from 101.
    #[must_use]
    pub fn from_ladder(ladder: &SizeLadder) -> Self {
        let mut lookup = Self::new();
        for (i, code) in ladder.codes().iter().enumerate() {
            lookup = lookup
                .with_size(Gender::Male, code, 1 + i as i64)
                .with_size(Gender::Female, code, 101 + i as i64);
        }
        lookup
    }

    /// Adds one entry.
    #[must_use]
    pub fn with_size(mut self, gender: Gender, size_code: &str, id: i64) -> Self {
        self.ids.insert((gender, size_code.to_string()), id);
        self
    }
}

impl SizeLookup for StaticSizeLookup {
    fn size_id(&self, gender: Gender, size_code: &str) -> Result<Option<i64>> {
        Ok(self.ids.get(&(gender, size_code.to_string())).copied())
    }
}

/// Height-band size table with fixed measure formulas.
///
/// Size: the first band whose upper height bound exceeds the profile's
/// height, one step larger when BMI is above `bmi_step_up`.
#[derive(Debug, Clone)]
pub struct TableRuleFunction {
    ladder: SizeLadder,
    height_bands: Vec<(f32, String)>,
    bmi_step_up: f32,
}

impl Default for TableRuleFunction {
    fn default() -> Self {
        let ladder = SizeLadder::default();
        let height_bands = [110.0, 120.0, 130.0, 140.0, 150.0, 160.0, f32::INFINITY]
            .into_iter()
            .zip(ladder.codes().iter().cloned())
            .collect();
        Self {
            ladder,
            height_bands,
            bmi_step_up: 22.0,
        }
    }
}

impl RuleFunction for TableRuleFunction {
    fn recommend_size(&self, profile: &Profile) -> Result<RuleFunctionSize> {
        let code = self
            .height_bands
            .iter()
            .find(|(max_height, _)| profile.height_cm() < *max_height)
            .map(|(_, code)| code.clone())
            .ok_or_else(|| SizewiseError::unavailable("rule_function", "height table is empty"))?;
        let code = if profile.bmi() > self.bmi_step_up {
            self.ladder.step_up(&code).unwrap_or(code.as_str()).to_string()
        } else {
            code
        };
        Ok(RuleFunctionSize {
            size_code: code,
            confidence: None,
        })
    }

    fn autofill_measure(&self, _garment: &str, measure: &str, profile: &Profile) -> Result<Option<f32>> {
        let value = match measure {
            "waist_cm" => profile.measure(MeasureField::Waist).map(|w| w + 3.0),
            "chest_cm" => profile.upper_girth().map(|c| c + 6.0),
            "hip_cm" => profile.measure(MeasureField::Hip).map(|h| h + 4.0),
            "shoulder_cm" => profile.measure(MeasureField::Shoulder).map(|s| s + 1.0),
            "sleeve_length_cm" => profile.measure(MeasureField::SleeveLength),
            "length_cm" => Some(profile.height_cm() * 0.42),
            _ => None,
        };
        Ok(value)
    }
}

/// Confidence reported for a rule-function result.
#[must_use]
pub fn rule_function_confidence(result: &RuleFunctionSize) -> f32 {
    result.confidence.unwrap_or(DEFAULT_RULE_CONFIDENCE)
}

/// Traces held in a map.
#[derive(Debug, Default)]
pub struct InMemoryTraceStore {
    traces: RwLock<HashMap<Uuid, ExplanationTrace>>,
}

impl InMemoryTraceStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TraceStore for InMemoryTraceStore {
    fn save(&self, trace: &ExplanationTrace) -> Result<()> {
        self.traces.write().insert(trace.decision_id(), trace.clone());
        Ok(())
    }

    fn load(&self, decision_id: Uuid) -> Result<Option<ExplanationTrace>> {
        Ok(self.traces.read().get(&decision_id).cloned())
    }
}

/// Traces as JSON files at `<root>/<decision_type>/<decision_id>.json`.
#[derive(Debug, Clone)]
pub struct FsTraceStore {
    root: PathBuf,
}

impl FsTraceStore {
    /// Store rooted at `root`; directories are created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, decision_type: DecisionType, decision_id: Uuid) -> PathBuf {
        self.root
            .join(decision_type.as_str())
            .join(format!("{decision_id}.json"))
    }
}

impl TraceStore for FsTraceStore {
    fn save(&self, trace: &ExplanationTrace) -> Result<()> {
        let path = self.path(trace.decision_type(), trace.decision_id());
        let json = serde_json::to_vec_pretty(trace)?;
        write_atomically(&path, &json)
    }

    fn load(&self, decision_id: Uuid) -> Result<Option<ExplanationTrace>> {
        for decision_type in DecisionType::ALL {
            let path = self.path(decision_type, decision_id);
            if path.exists() {
                let bytes = std::fs::read(&path)?;
                return Ok(Some(serde_json::from_slice(&bytes)?));
            }
        }
        Ok(None)
    }
}

/// Writes `bytes` to a temporary file next to `path`, then renames it into place.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| SizewiseError::InvalidInput(format!("{} has no parent directory", path.display())))?;
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| SizewiseError::Io(e.error))?;
    Ok(())
}

const SHIRT: &[&str] = &["chest_cm", "shoulder_cm", "sleeve_length_cm", "length_cm"];
const BOTTOM: &[&str] = &["waist_cm", "length_cm"];
const VEST: &[&str] = &["chest_cm", "length_cm"];
const DRESS: &[&str] = &["chest_cm", "waist_cm", "length_cm"];

const BOYS: &[&str] = &[
    "boys_formal_shirt_half",
    "boys_formal_shirt_full",
    "boys_formal_pants",
    "boys_elastic_pants",
    "boys_shorts",
    "boys_elastic_shorts",
    "boys_waistcoat",
    "boys_blazer",
    "boys_formal_tshirt",
];

const GIRLS: &[&str] = &[
    "girls_formal_shirt_half",
    "girls_formal_shirt_full",
    "girls_pinafore",
    "girls_skirt",
    "girls_skorts",
    "girls_special_frock",
    "girls_kurta_top",
    "girls_kurta_pant",
    "girls_dupatta",
    "girls_formal_pants",
    "girls_elastic_pants",
    "girls_waistcoat",
    "girls_blazer",
    "girls_bloomers",
    "girls_formal_tshirt",
];

const SPORTS: &[&str] = &[
    "sports_tshirt",
    "track_pants",
    "track_shorts",
    "jerkin",
    "pullover_cap",
];

/// Static garment catalog.
#[derive(Debug, Clone)]
pub struct InMemoryGarmentCatalog {
    garments: HashMap<Gender, (Vec<String>, Vec<String>)>,
    measures: HashMap<String, Vec<String>>,
}

impl InMemoryGarmentCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            garments: HashMap::new(),
            measures: HashMap::new(),
        }
    }

    /// Adds a garment with its measures.
    #[must_use]
    pub fn with_garment(mut self, gender: Gender, garment: &str, sports: bool, measures: &[&str]) -> Self {
        let entry = self.garments.entry(gender).or_default();
        let list = if sports { &mut entry.1 } else { &mut entry.0 };
        list.push(garment.to_string());
        self.measures
            .insert(garment.to_string(), measures.iter().map(|m| (*m).to_string()).collect());
        self
    }
}

impl Default for InMemoryGarmentCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        for (gender, prefix, list) in [(Gender::Male, "boys", BOYS), (Gender::Female, "girls", GIRLS)] {
            for garment in list {
                catalog = catalog.with_garment(gender, garment, false, default_measures(garment));
            }
            for sport in SPORTS {
                let garment = format!("{prefix}_{sport}");
                let measures = default_measures(&garment);
                catalog = catalog.with_garment(gender, &garment, true, measures);
            }
        }
        catalog
    }
}

fn default_measures(garment: &str) -> &'static [&'static str] {
    if garment.ends_with("pullover_cap") {
        &[]
    } else if garment.ends_with("dupatta") {
        &["length_cm"]
    } else if garment.contains("shirt") || garment.ends_with("blazer") || garment.ends_with("jerkin") || garment.ends_with("kurta_top") {
        SHIRT
    } else if garment.ends_with("waistcoat") {
        VEST
    } else if garment.ends_with("pinafore") || garment.ends_with("frock") {
        DRESS
    } else {
        BOTTOM
    }
}

impl GarmentCatalog for InMemoryGarmentCatalog {
    fn garments(&self, gender: Gender, include_sports: bool) -> Result<Vec<String>> {
        let Some((regular, sports)) = self.garments.get(&gender) else {
            return Ok(Vec::new());
        };
        let mut out = regular.clone();
        if include_sports {
            out.extend(sports.iter().cloned());
        }
        Ok(out)
    }

    fn measures(&self, garment: &str) -> Result<Vec<String>> {
        Ok(self.measures.get(garment).cloned().unwrap_or_default())
    }
}

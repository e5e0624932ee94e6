pub mod grid;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::openapi::schema::{ObjectBuilder, OneOfBuilder, Schema, SchemaType};
use utoipa::openapi::RefOr;
use utoipa::ToSchema;

pub use grid::{Coord, Grid, Occupant};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Clone,
            Debug,
            Serialize,
            Deserialize,
            ToSchema,
            JsonSchema,
            Eq,
            PartialEq,
            Hash,
            PartialOrd,
            Ord,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}
id_newtype!(TeacherId);
id_newtype!(RequirementId);
id_newtype!(SubjectArea);

/// Subject area any teacher may cover.
pub const UNIVERSAL_SUBJECT: &str = "Other";

/// Subject areas counted by the secondary ranking score.
pub const CORE_SUBJECTS: [&str; 4] = ["English", "Math", "Science", "Social Studies"];

impl SubjectArea {
    pub fn is_universal(&self) -> bool {
        self.0 == UNIVERSAL_SUBJECT
    }

    pub fn is_core(&self) -> bool {
        CORE_SUBJECTS.contains(&self.0.as_str())
    }
}

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 5] = [
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
    ];
    pub const COUNT: usize = 5;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            DayOfWeek::Mon => "Monday",
            DayOfWeek::Tue => "Tuesday",
            DayOfWeek::Wed => "Wednesday",
            DayOfWeek::Thu => "Thursday",
            DayOfWeek::Fri => "Friday",
        }
    }

    /// Matches a day by its first three letters, case-insensitively
    /// ("mon", "Monday", "MONDAY" all resolve to `Mon`).
    pub fn parse_prefix(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.len() < 3 || !s.is_char_boundary(3) {
            return None;
        }
        let head = s[..3].to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.name()[..3].eq_ignore_ascii_case(&head))
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name()[..3])
    }
}

/// Grade level of a requirement. `Mixed` offerings count toward every grade.
/// On the wire a grade is a bare number or the literal `"Mixed"`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default)]
pub enum GradeLevel {
    Grade(u8),
    #[default]
    Mixed,
}

#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
enum GradeWire {
    Grade(u8),
    Mixed(MixedLabel),
}

#[derive(Serialize, Deserialize, JsonSchema)]
enum MixedLabel {
    Mixed,
}

impl Serialize for GradeLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            GradeLevel::Grade(g) => GradeWire::Grade(g),
            GradeLevel::Mixed => GradeWire::Mixed(MixedLabel::Mixed),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GradeLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match GradeWire::deserialize(deserializer)? {
            GradeWire::Grade(g) => GradeLevel::Grade(g),
            GradeWire::Mixed(MixedLabel::Mixed) => GradeLevel::Mixed,
        })
    }
}

impl JsonSchema for GradeLevel {
    fn schema_name() -> String {
        "GradeLevel".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        GradeWire::json_schema(gen)
    }
}

impl<'s> ToSchema<'s> for GradeLevel {
    fn schema() -> (&'s str, RefOr<Schema>) {
        let grade = ObjectBuilder::new()
            .schema_type(SchemaType::Integer)
            .minimum(Some(0.0))
            .maximum(Some(255.0))
            .build();
        let mixed = ObjectBuilder::new()
            .schema_type(SchemaType::String)
            .enum_values(Some(["Mixed"]))
            .build();
        let one_of = OneOfBuilder::new()
            .item(Schema::Object(grade))
            .item(Schema::Object(mixed))
            .build();
        ("GradeLevel", RefOr::T(Schema::OneOf(one_of)))
    }
}

impl GradeLevel {
    pub fn covers(&self, grade: u8) -> bool {
        match self {
            GradeLevel::Grade(g) => *g == grade,
            GradeLevel::Mixed => true,
        }
    }

    pub fn as_grade(&self) -> Option<u8> {
        match self {
            GradeLevel::Grade(g) => Some(*g),
            GradeLevel::Mixed => None,
        }
    }
}

impl fmt::Display for GradeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeLevel::Grade(g) => write!(f, "{g}"),
            GradeLevel::Mixed => f.write_str("Mixed"),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash)]
pub struct Slot {
    pub day: DayOfWeek,
    pub period: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConstraintKind {
    Not,
    Assign,
}

/// One parsed placement rule. `day == None` means any day.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, Hash)]
pub struct SlotConstraint {
    pub kind: ConstraintKind,
    #[serde(default)]
    pub day: Option<DayOfWeek>,
    pub period: u32,
}

impl SlotConstraint {
    pub fn not(day: Option<DayOfWeek>, period: u32) -> Self {
        Self {
            kind: ConstraintKind::Not,
            day,
            period,
        }
    }

    pub fn assign(day: DayOfWeek, period: u32) -> Self {
        Self {
            kind: ConstraintKind::Assign,
            day: Some(day),
            period,
        }
    }

    pub fn matches(&self, day: DayOfWeek, period: u32) -> bool {
        self.period == period && self.day.map_or(true, |d| d == day)
    }
}

/// Weekly availability. Every slot not listed in `blocked` is available.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq)]
pub struct Availability {
    #[serde(default)]
    pub blocked: Vec<Slot>,
}

impl Availability {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn is_available(&self, day: DayOfWeek, period: u32) -> bool {
        !self.blocked.iter().any(|s| s.day == day && s.period == period)
    }

    pub fn block(&mut self, day: DayOfWeek, period: u32) {
        if self.is_available(day, period) {
            self.blocked.push(Slot { day, period });
        }
    }

    pub fn available_count(&self, periods_per_day: u32) -> u32 {
        DayOfWeek::ALL
            .iter()
            .map(|&d| {
                (0..periods_per_day)
                    .filter(|&p| self.is_available(d, p))
                    .count() as u32
            })
            .sum()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: TeacherId,
    #[serde(default)]
    pub qualifications: Vec<SubjectArea>,
    #[serde(default)]
    pub availability: Availability,
    /// Free-text availability ("Mon P1-2; Fri afternoon unavailable"),
    /// folded into `availability` at run start.
    #[serde(default)]
    pub availability_raw: Option<String>,
}

impl Teacher {
    pub fn new(id: impl Into<String>, qualifications: &[&str]) -> Self {
        Self {
            id: TeacherId(id.into()),
            qualifications: qualifications.iter().map(|&q| SubjectArea::from(q)).collect(),
            availability: Availability::always(),
            availability_raw: None,
        }
    }

    pub fn is_qualified(&self, subject: &SubjectArea) -> bool {
        subject.is_universal() || self.qualifications.contains(subject)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub id: RequirementId,
    #[serde(default)]
    pub subject: Option<SubjectArea>,
    #[serde(default)]
    pub grade: GradeLevel,
    #[serde(default = "default_term")]
    pub term: u32,
    #[serde(default)]
    pub periods_per_week: u32,
    #[serde(default)]
    pub credits: Option<u32>,
    #[serde(default)]
    pub constraints: Vec<SlotConstraint>,
    /// Free-text rules in the `NOT ...` / `ASSIGN ...` syntax, parsed at run start.
    #[serde(default)]
    pub constraints_raw: Option<String>,
    /// Pre-bound teacher.
    #[serde(default)]
    pub teacher: Option<TeacherId>,
}

fn default_term() -> u32 {
    1
}

impl Requirement {
    pub fn new(id: impl Into<String>, subject: &str, grade: GradeLevel, periods_per_week: u32) -> Self {
        Self {
            id: RequirementId(id.into()),
            subject: Some(SubjectArea::from(subject)),
            grade,
            term: 1,
            periods_per_week,
            credits: None,
            constraints: Vec::new(),
            constraints_raw: None,
            teacher: None,
        }
    }

    pub fn has_assign(&self) -> bool {
        self.constraints.iter().any(|c| c.kind == ConstraintKind::Assign)
    }

    pub fn assign_slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.constraints.iter().filter_map(|c| match (c.kind, c.day) {
            (ConstraintKind::Assign, Some(day)) => Some(Slot {
                day,
                period: c.period,
            }),
            _ => None,
        })
    }

    /// Day-preference rules broken by a period on `day`: three-credit
    /// courses belong on Mon/Wed/Fri, CTS courses on Tue/Thu.
    pub fn day_preference_misses(&self, day: DayOfWeek) -> u32 {
        let mwf = matches!(day, DayOfWeek::Mon | DayOfWeek::Wed | DayOfWeek::Fri);
        let cts = self.subject.as_ref().is_some_and(|s| s.0.eq_ignore_ascii_case("CTS"));
        u32::from(self.credits == Some(3) && !mwf) + u32::from(cts && mwf)
    }

    pub fn is_cree(&self) -> bool {
        self.subject.as_ref().is_some_and(|s| s.0.eq_ignore_ascii_case("cree"))
    }

    pub fn forbids(&self, day: DayOfWeek, period: u32) -> bool {
        self.constraints
            .iter()
            .any(|c| c.kind == ConstraintKind::Not && c.matches(day, period))
    }
}

/// Requirements sharing students; they may never sit in the same period.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq)]
#[serde(transparent)]
pub struct CohortClash(pub Vec<RequirementId>);

impl CohortClash {
    pub fn contains(&self, id: &RequirementId) -> bool {
        self.0.contains(id)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Default, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SchoolType {
    /// Term-bound requirements, full-coverage grades, combination fallback.
    #[default]
    HighSchool,
    /// Every requirement runs in every term; no coverage rule and no combining.
    Elementary,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunParams {
    pub periods_per_day: u32,
    #[serde(default = "default_one")]
    pub tracks_per_period: u32,
    #[serde(default = "default_one")]
    pub num_terms: u32,
    #[serde(default = "default_weeks_per_term")]
    pub weeks_per_term: u32,
    #[serde(default = "default_period_minutes")]
    pub period_minutes: u32,
    #[serde(default = "default_true")]
    pub allow_same_day_repeat: bool,
    #[serde(default = "default_full_coverage_grades")]
    pub full_coverage_grades: Vec<u8>,
    #[serde(default = "default_min_completion_ratio")]
    pub min_completion_ratio: f64,
    #[serde(default = "default_min_prep_blocks")]
    pub min_prep_blocks: u32,
    #[serde(default)]
    pub school_type: SchoolType,
    /// Charge every term without a placed Cree offering.
    #[serde(default)]
    pub enforce_cree_per_term: bool,
}

fn default_one() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_weeks_per_term() -> u32 {
    18
}
fn default_period_minutes() -> u32 {
    60
}
fn default_full_coverage_grades() -> Vec<u8> {
    vec![10, 11, 12]
}
fn default_min_completion_ratio() -> f64 {
    0.75
}
fn default_min_prep_blocks() -> u32 {
    2
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            periods_per_day: 5,
            tracks_per_period: 1,
            num_terms: 1,
            weeks_per_term: default_weeks_per_term(),
            period_minutes: default_period_minutes(),
            allow_same_day_repeat: true,
            full_coverage_grades: default_full_coverage_grades(),
            min_completion_ratio: default_min_completion_ratio(),
            min_prep_blocks: default_min_prep_blocks(),
            school_type: SchoolType::HighSchool,
            enforce_cree_per_term: false,
        }
    }
}

impl RunParams {
    pub fn slots_per_week(&self) -> u32 {
        DayOfWeek::COUNT as u32 * self.periods_per_day
    }

    /// Grades that must have a class in every slot. Elementary runs have none.
    pub fn coverage_grades(&self) -> &[u8] {
        match self.school_type {
            SchoolType::HighSchool => &self.full_coverage_grades,
            SchoolType::Elementary => &[],
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub params: RunParams,
    pub teachers: Vec<Teacher>,
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub cohort_clashes: Vec<CohortClash>,
}

impl Instance {
    pub fn teacher(&self, id: &TeacherId) -> Option<&Teacher> {
        self.teachers.iter().find(|t| &t.id == id)
    }

    pub fn requirement(&self, id: &RequirementId) -> Option<&Requirement> {
        self.requirements.iter().find(|r| &r.id == id)
    }

    pub fn requirements_in_term(&self, term: u32) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter().filter(move |r| r.term == term)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Default, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Constructive placement, judged by validation metrics.
    #[default]
    Constructive,
    /// Complete initial grid refined by simulated annealing, judged by cost.
    Annealing,
    /// Constructive placement; failed attempts are completed and annealed.
    Hybrid,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnealParams {
    pub initial_temperature: f64,
    pub cooling_rate: f64,
    pub iterations_per_temperature: u32,
    pub min_temperature: f64,
    pub max_iterations: u64,
}

impl Default for AnnealParams {
    fn default() -> Self {
        Self {
            initial_temperature: 1000.0,
            cooling_rate: 0.99,
            iterations_per_temperature: 150,
            min_temperature: 0.1,
            max_iterations: 75_000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PenaltyWeights {
    pub double_booked: f64,
    pub unavailable: f64,
    pub unqualified: f64,
    pub not_violation: f64,
    pub cohort_clash: f64,
    pub insufficient_prep: f64,
    pub unmet_coverage_slot: f64,
    pub unplaced_period: f64,
    pub period_inconsistency: f64,
    pub credit_minutes_mismatch: f64,
    pub off_preferred_day: f64,
    pub missing_cree_term: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            double_booked: 1000.0,
            unavailable: 1000.0,
            unqualified: 1500.0,
            not_violation: 1000.0,
            cohort_clash: 1200.0,
            insufficient_prep: 800.0,
            unmet_coverage_slot: 700.0,
            unplaced_period: 500.0,
            period_inconsistency: 100.0,
            credit_minutes_mismatch: 75.0,
            off_preferred_day: 10.0,
            missing_cree_term: 900.0,
        }
    }
}

/// Two low-enrollment requirements that may be merged into one offering.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq)]
pub struct CombinablePair {
    pub first: RequirementId,
    pub second: RequirementId,
}

impl CombinablePair {
    pub fn new(first: &str, second: &str) -> Self {
        Self {
            first: RequirementId::from(first),
            second: RequirementId::from(second),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SolveParams {
    pub seed: u64,
    pub mode: SearchMode,
    pub target_schedules: u32,
    pub max_attempts: u32,
    pub workers: u32,
    pub anneal: AnnealParams,
    pub weights: PenaltyWeights,
    /// Replaces the built-in combination table when present.
    pub combinable_pairs: Option<Vec<CombinablePair>>,
}

impl Default for SolveParams {
    fn default() -> Self {
        Self {
            seed: 0,
            mode: SearchMode::Constructive,
            target_schedules: 1,
            max_attempts: 200,
            workers: 1,
            anneal: AnnealParams::default(),
            weights: PenaltyWeights::default(),
            combinable_pairs: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
pub struct SolveEnvelope {
    pub instance: Instance,
    #[serde(default)]
    pub params: SolveParams,
}

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq, PartialOrd, Ord,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

/// Placed vs. required periods for one requirement in one attempt.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlacementCount {
    pub requirement: RequirementId,
    pub term: u32,
    #[serde(default)]
    pub teacher: Option<TeacherId>,
    pub placed: u32,
    pub required: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttemptMetrics {
    pub completion_ratio: f64,
    pub term_completion: Vec<f64>,
    pub placed_periods: u32,
    pub required_periods: u32,
    pub unmet_grade_slots: u32,
    pub unmet_prep_teachers: u32,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub iterations: Option<u64>,
    #[serde(default)]
    pub g11_core_count: u32,
    #[serde(default)]
    pub g12_core_count: u32,
}

impl AttemptMetrics {
    /// Metrics for an attempt aborted before anything could be judged.
    pub fn aborted() -> Self {
        Self {
            unmet_grade_slots: u32::MAX,
            unmet_prep_teachers: u32::MAX,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRecord {
    pub id: String,
    pub attempt: u32,
    pub grid: Grid,
    pub metrics: AttemptMetrics,
    pub placements: Vec<PlacementCount>,
    pub fingerprint: String,
    #[serde(default)]
    pub combined: bool,
    #[serde(default)]
    pub best: bool,
    #[serde(default)]
    pub log: Vec<LogLine>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Solved,
    BestFailed,
    Cancelled,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SolveResult {
    pub status: SolveStatus,
    pub schedules: Vec<ScheduleRecord>,
    #[serde(default)]
    pub best_failed: Option<ScheduleRecord>,
    pub attempts: u32,
    #[serde(default)]
    pub combined_requirements: Vec<RequirementId>,
    pub log: Vec<LogLine>,
    pub stats: serde_json::Value,
}

impl SolveResult {
    pub fn best(&self) -> Option<&ScheduleRecord> {
        self.schedules.iter().find(|s| s.best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_prefix_matching() {
        assert_eq!(DayOfWeek::parse_prefix("monday"), Some(DayOfWeek::Mon));
        assert_eq!(DayOfWeek::parse_prefix("WED"), Some(DayOfWeek::Wed));
        assert_eq!(DayOfWeek::parse_prefix("Fr"), None);
        assert_eq!(DayOfWeek::parse_prefix("Sat"), None);
    }

    #[test]
    fn mixed_grade_covers_everything() {
        assert!(GradeLevel::Mixed.covers(10));
        assert!(GradeLevel::Grade(11).covers(11));
        assert!(!GradeLevel::Grade(11).covers(12));
    }

    #[test]
    fn grade_is_a_bare_number_or_mixed() {
        let g: GradeLevel = serde_json::from_value(serde_json::json!(10)).unwrap();
        assert_eq!(g, GradeLevel::Grade(10));
        let m: GradeLevel = serde_json::from_value(serde_json::json!("Mixed")).unwrap();
        assert_eq!(m, GradeLevel::Mixed);
        assert_eq!(serde_json::to_value(GradeLevel::Grade(12)).unwrap(), serde_json::json!(12));
        assert_eq!(serde_json::to_value(GradeLevel::Mixed).unwrap(), serde_json::json!("Mixed"));
        assert!(serde_json::from_value::<GradeLevel>(serde_json::json!("mixed")).is_err());
        assert!(serde_json::from_value::<GradeLevel>(serde_json::json!({ "grade": 10 })).is_err());
    }

    #[test]
    fn universal_subject_needs_no_qualification() {
        let t = Teacher::new("A", &["Math"]);
        assert!(t.is_qualified(&SubjectArea::from("Math")));
        assert!(t.is_qualified(&SubjectArea::from("Other")));
        assert!(!t.is_qualified(&SubjectArea::from("English")));
    }

    #[test]
    fn day_preferences_by_credits_and_subject() {
        let mut r = Requirement::new("Wood10", "CTS", GradeLevel::Grade(10), 3);
        assert_eq!(r.day_preference_misses(DayOfWeek::Tue), 0);
        assert_eq!(r.day_preference_misses(DayOfWeek::Mon), 1);
        r.credits = Some(3);
        assert_eq!(r.day_preference_misses(DayOfWeek::Tue), 1);
        assert_eq!(r.day_preference_misses(DayOfWeek::Mon), 1);
        let plain = Requirement::new("Math10", "Math", GradeLevel::Grade(10), 3);
        assert!(DayOfWeek::ALL.iter().all(|&d| plain.day_preference_misses(d) == 0));
        assert!(Requirement::new("Cree7", "cree", GradeLevel::Grade(7), 2).is_cree());
    }

    #[test]
    fn availability_counts_blocked_slots() {
        let mut a = Availability::always();
        a.block(DayOfWeek::Mon, 0);
        a.block(DayOfWeek::Mon, 0);
        assert_eq!(a.blocked.len(), 1);
        assert_eq!(a.available_count(5), 24);
        assert!(!a.is_available(DayOfWeek::Mon, 0));
    }

    #[test]
    fn envelope_defaults_fill_in() {
        let raw = serde_json::json!({
            "instance": {
                "params": { "periodsPerDay": 5 },
                "teachers": [{ "id": "A", "qualifications": ["Math"] }],
                "requirements": [{ "id": "Math10", "subject": "Math", "grade": 10, "periodsPerWeek": 3 }]
            }
        });
        let env: SolveEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(env.instance.params.min_prep_blocks, 2);
        assert_eq!(env.instance.params.full_coverage_grades, vec![10, 11, 12]);
        assert_eq!(env.instance.requirements[0].term, 1);
        assert_eq!(env.instance.requirements[0].grade, GradeLevel::Grade(10));
        assert_eq!(env.params.max_attempts, 200);
        assert_eq!(env.params.anneal.max_iterations, 75_000);
    }
}

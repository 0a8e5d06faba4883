use anyhow::Error;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::error::AppError;

fn to_utc(ts: Option<NaiveDateTime>) -> DateTime<Utc> {
    ts.map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .unwrap_or_else(Utc::now)
}

fn to_utc_opt(ts: Option<NaiveDateTime>) -> Option<DateTime<Utc>> {
    ts.map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub level: crate::auth::PermissionLevel,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUser {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub permission_level: Option<i64>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbUser> for User {
    fn from(user: DbUser) -> Self {
        Self {
            id: user.id.unwrap_or_default(),
            display_name: user.display_name.unwrap_or_default(),
            email: user.email.unwrap_or_default(),
            level: crate::auth::PermissionLevel::from_level(user.permission_level.unwrap_or(2))
                .unwrap_or(crate::auth::PermissionLevel::Student),
            created_at: to_utc(user.created_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RelationshipStatus {
    Pending,
    Confirmed,
}

impl RelationshipStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RelationshipStatus::Pending => "pending",
            RelationshipStatus::Confirmed => "confirmed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "pending" => Ok(RelationshipStatus::Pending),
            "confirmed" => Ok(RelationshipStatus::Confirmed),
            _ => Err(Error::msg(format!("Unknown relationship status: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Relationship {
    pub id: String,
    pub student_id: String,
    pub tutor_id: String,
    pub status: RelationshipStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbRelationship {
    pub id: Option<String>,
    pub student_id: Option<String>,
    pub tutor_id: Option<String>,
    pub status: Option<String>,
    pub created_by: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub confirmed_at: Option<NaiveDateTime>,
}

impl From<DbRelationship> for Relationship {
    fn from(db: DbRelationship) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            student_id: db.student_id.unwrap_or_default(),
            tutor_id: db.tutor_id.unwrap_or_default(),
            status: RelationshipStatus::from_str(&db.status.unwrap_or_default())
                .unwrap_or(RelationshipStatus::Pending),
            created_by: db.created_by.unwrap_or_default(),
            created_at: to_utc(db.created_at),
            confirmed_at: to_utc_opt(db.confirmed_at),
        }
    }
}

/// The caller's side of a relationship, annotated onto list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipRole {
    Student,
    Tutor,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationshipView {
    pub relationship: Relationship,
    pub role: RelationshipRole,
}

/// The owned-record kinds sharing the uniqueness/batch-create policy. Each
/// kind keys records by one primary content field per owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceKind {
    Vocabulary,
    Sentence,
    GrammarRule,
    Expression,
    Resource,
}

impl ResourceKind {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceKind::Vocabulary => "vocabulary",
            ResourceKind::Sentence => "sentence",
            ResourceKind::GrammarRule => "grammar_rule",
            ResourceKind::Expression => "expression",
            ResourceKind::Resource => "resource",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "vocabulary" => Ok(ResourceKind::Vocabulary),
            "sentence" => Ok(ResourceKind::Sentence),
            "grammar_rule" => Ok(ResourceKind::GrammarRule),
            "expression" => Ok(ResourceKind::Expression),
            "resource" => Ok(ResourceKind::Resource),
            _ => Err(Error::msg(format!("Unknown resource kind: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VocabularyContent {
    #[validate(length(min = 1, message = "Word must not be empty"))]
    pub word: String,
    pub translation: String,
    #[serde(default)]
    pub pronunciation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SentenceContent {
    #[validate(length(min = 1, message = "Sentence must not be empty"))]
    pub sentence: String,
    pub translation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GrammarRuleContent {
    #[validate(length(min = 1, message = "Rule must not be empty"))]
    pub rule: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExpressionContent {
    #[validate(length(min = 1, message = "Expression must not be empty"))]
    pub expression: String,
    pub meaning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenericResourceContent {
    #[validate(length(min = 1, message = "Target language must not be empty"))]
    pub target_language: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// Kind-specific content of an owned record. The variant decides both the
/// kind and the primary content key the per-owner uniqueness applies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceBody {
    Vocabulary(VocabularyContent),
    Sentence(SentenceContent),
    GrammarRule(GrammarRuleContent),
    Expression(ExpressionContent),
    Resource(GenericResourceContent),
}

impl ResourceBody {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceBody::Vocabulary(_) => ResourceKind::Vocabulary,
            ResourceBody::Sentence(_) => ResourceKind::Sentence,
            ResourceBody::GrammarRule(_) => ResourceKind::GrammarRule,
            ResourceBody::Expression(_) => ResourceKind::Expression,
            ResourceBody::Resource(_) => ResourceKind::Resource,
        }
    }

    pub fn content_key(&self) -> &str {
        match self {
            ResourceBody::Vocabulary(c) => &c.word,
            ResourceBody::Sentence(c) => &c.sentence,
            ResourceBody::GrammarRule(c) => &c.rule,
            ResourceBody::Expression(c) => &c.expression,
            ResourceBody::Resource(c) => &c.target_language,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            ResourceBody::Vocabulary(c) => c.validate(),
            ResourceBody::Sentence(c) => c.validate(),
            ResourceBody::GrammarRule(c) => c.validate(),
            ResourceBody::Expression(c) => c.validate(),
            ResourceBody::Resource(c) => c.validate(),
        }
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rebuilds a body from the stored kind tag plus content JSON. The kind
    /// column is authoritative; untagged deserialization alone could not
    /// tell the variants apart.
    pub fn from_parts(kind: ResourceKind, content: &str) -> Result<Self, AppError> {
        let body = match kind {
            ResourceKind::Vocabulary => ResourceBody::Vocabulary(serde_json::from_str(content)?),
            ResourceKind::Sentence => ResourceBody::Sentence(serde_json::from_str(content)?),
            ResourceKind::GrammarRule => ResourceBody::GrammarRule(serde_json::from_str(content)?),
            ResourceKind::Expression => ResourceBody::Expression(serde_json::from_str(content)?),
            ResourceKind::Resource => ResourceBody::Resource(serde_json::from_str(content)?),
        };
        Ok(body)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnedRecord {
    pub id: String,
    pub owner_id: String,
    pub kind: ResourceKind,
    pub body: ResourceBody,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbOwnedRecord {
    pub id: Option<String>,
    pub owner_id: Option<String>,
    pub kind: Option<String>,
    pub content_key: Option<String>,
    pub content: Option<String>,
    pub comment: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl TryFrom<DbOwnedRecord> for OwnedRecord {
    type Error = AppError;

    fn try_from(db: DbOwnedRecord) -> Result<Self, AppError> {
        let kind = ResourceKind::from_str(&db.kind.unwrap_or_default())
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let body = ResourceBody::from_parts(kind, &db.content.unwrap_or_default())?;

        Ok(Self {
            id: db.id.unwrap_or_default(),
            owner_id: db.owner_id.unwrap_or_default(),
            kind,
            body,
            comment: db.comment.unwrap_or_default(),
            created_at: to_utc(db.created_at),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Example {
    pub id: String,
    pub resource_id: String,
    pub sentence: String,
    pub translation: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbExample {
    pub id: Option<String>,
    pub resource_id: Option<String>,
    pub sentence: Option<String>,
    pub translation: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbExample> for Example {
    fn from(db: DbExample) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            resource_id: db.resource_id.unwrap_or_default(),
            sentence: db.sentence.unwrap_or_default(),
            translation: db.translation.unwrap_or_default(),
            created_at: to_utc(db.created_at),
        }
    }
}

/// A record together with its attached examples, as returned by get-by-id.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDetail {
    pub record: OwnedRecord,
    pub examples: Vec<Example>,
}

/// Outcome of a fan-out create. Skipped owners already had the content key
/// and are informational only, never an error.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub created: Vec<OwnedRecord>,
    pub skipped_owners: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalPeriod {
    Day,
    Week,
    Month,
    Year,
}

impl GoalPeriod {
    pub fn as_str(&self) -> &str {
        match self {
            GoalPeriod::Day => "day",
            GoalPeriod::Week => "week",
            GoalPeriod::Month => "month",
            GoalPeriod::Year => "year",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "day" => Ok(GoalPeriod::Day),
            "week" => Ok(GoalPeriod::Week),
            "month" => Ok(GoalPeriod::Month),
            "year" => Ok(GoalPeriod::Year),
            _ => Err(Error::msg(format!("Unknown goal period: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Goal {
    pub id: String,
    pub owner_id: String,
    pub activity_id: String,
    pub duration_minutes: i64,
    pub period: GoalPeriod,
    pub deadline: Option<DateTime<Utc>>,
    pub open_ended: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbGoal {
    pub id: Option<String>,
    pub owner_id: Option<String>,
    pub activity_id: Option<String>,
    pub duration_minutes: Option<i64>,
    pub period: Option<String>,
    pub deadline: Option<NaiveDateTime>,
    pub open_ended: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbGoal> for Goal {
    fn from(db: DbGoal) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            owner_id: db.owner_id.unwrap_or_default(),
            activity_id: db.activity_id.unwrap_or_default(),
            duration_minutes: db.duration_minutes.unwrap_or_default(),
            period: GoalPeriod::from_str(&db.period.unwrap_or_default())
                .unwrap_or(GoalPeriod::Week),
            deadline: to_utc_opt(db.deadline),
            open_ended: db.open_ended.unwrap_or_default(),
            created_at: to_utc(db.created_at),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeLog {
    pub id: String,
    pub owner_id: String,
    pub activity_id: String,
    pub goal_id: Option<String>,
    pub comment: String,
    pub duration_minutes: i64,
    pub logged_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTimeLog {
    pub id: Option<String>,
    pub owner_id: Option<String>,
    pub activity_id: Option<String>,
    pub goal_id: Option<String>,
    pub comment: Option<String>,
    pub duration_minutes: Option<i64>,
    pub logged_at: Option<NaiveDateTime>,
}

impl From<DbTimeLog> for TimeLog {
    fn from(db: DbTimeLog) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            owner_id: db.owner_id.unwrap_or_default(),
            activity_id: db.activity_id.unwrap_or_default(),
            goal_id: db.goal_id,
            comment: db.comment.unwrap_or_default(),
            duration_minutes: db.duration_minutes.unwrap_or_default(),
            logged_at: to_utc(db.logged_at),
        }
    }
}

/// Logged total against a goal's target. The percentage is deliberately not
/// clamped; over-achievement reads above 100.
#[derive(Debug, Clone, Serialize)]
pub struct GoalProgress {
    pub goal: Goal,
    pub total_logged: i64,
    pub progress_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeLogAggregate {
    pub total_duration: i64,
    pub log_ids: Vec<String>,
}

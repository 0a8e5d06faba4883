use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::activities::ActivityCatalog;
use crate::auth::{Principal, require_access, resolve_owners, resolve_target, scope_filter};
use crate::db;
use crate::error::AppError;
use crate::events::{EventAction, EventSink};
use crate::models::{Goal, GoalPeriod, GoalProgress, TimeLog, TimeLogAggregate};
use crate::validation::validate_payload;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewGoal {
    #[validate(length(min = 1, message = "Activity id must not be empty"))]
    pub activity_id: String,
    #[validate(range(min = 1, message = "Duration must be positive"))]
    pub duration_minutes: i64,
    pub period: GoalPeriod,
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub open_ended: bool,
}

#[derive(Debug, Clone, Deserialize, Validate, Default)]
pub struct GoalPatch {
    #[validate(range(min = 1, message = "Duration must be positive"))]
    pub duration_minutes: Option<i64>,
    pub period: Option<GoalPeriod>,
    pub deadline: Option<DateTime<Utc>>,
    pub open_ended: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTimeLog {
    #[validate(length(min = 1, message = "Activity id must not be empty"))]
    pub activity_id: String,
    #[validate(range(min = 1, message = "Duration must be positive"))]
    pub duration_minutes: i64,
    pub goal_id: Option<String>,
    #[serde(default)]
    pub comment: String,
    /// Caller-supplied for backdating; defaults to now.
    pub logged_at: Option<DateTime<Utc>>,
}

/// Goals, time logging against them, and the progress roll-ups.
#[derive(Clone)]
pub struct GoalService {
    pool: Pool<Sqlite>,
    catalog: Arc<dyn ActivityCatalog>,
    events: EventSink,
}

impl GoalService {
    pub fn new(pool: Pool<Sqlite>, catalog: Arc<dyn ActivityCatalog>, events: EventSink) -> Self {
        Self {
            pool,
            catalog,
            events,
        }
    }

    fn check_activity(&self, activity_id: &str) -> Result<(), AppError> {
        if !self.catalog.is_valid_activity(activity_id) {
            return Err(AppError::Validation(format!(
                "Unknown activity: {}",
                activity_id
            )));
        }
        Ok(())
    }

    /// Fans the goal out over the resolved owner set. Goals carry no
    /// per-owner content key, so unlike content records there is nothing to
    /// dedup against.
    #[instrument(skip(self, principal, payload), fields(principal_id = %principal.id))]
    pub async fn create_goal(
        &self,
        principal: &Principal,
        payload: NewGoal,
        student_ids: &[String],
    ) -> Result<Vec<Goal>, AppError> {
        validate_payload(&payload)?;
        self.check_activity(&payload.activity_id)?;

        let owners = resolve_owners(principal, student_ids)?;

        let mut created = Vec::new();
        for owner in &owners {
            let goal = db::insert_goal(
                &self.pool,
                owner,
                &payload.activity_id,
                payload.duration_minutes,
                payload.period,
                payload.deadline.map(|dt| dt.naive_utc()),
                payload.open_ended,
            )
            .await?;

            self.events.emit(
                EventAction::Created,
                "goal",
                serde_json::json!({ "id": goal.id, "owner_id": goal.owner_id }),
            );
            created.push(goal);
        }

        Ok(created)
    }

    #[instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn get_goals(
        &self,
        principal: &Principal,
        student_ids: &[String],
    ) -> Result<Vec<Goal>, AppError> {
        let scope = scope_filter(principal, student_ids);
        db::list_goals(&self.pool, scope.as_deref()).await
    }

    #[instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn get_goal(&self, principal: &Principal, id: &str) -> Result<Goal, AppError> {
        let goal = db::get_goal(&self.pool, id).await?;
        require_access(principal, &goal.owner_id)?;
        Ok(goal)
    }

    #[instrument(skip(self, principal, patch), fields(principal_id = %principal.id))]
    pub async fn update_goal(
        &self,
        principal: &Principal,
        id: &str,
        patch: GoalPatch,
    ) -> Result<Goal, AppError> {
        validate_payload(&patch)?;

        let mut goal = db::get_goal(&self.pool, id).await?;
        require_access(principal, &goal.owner_id)?;

        if let Some(duration) = patch.duration_minutes {
            goal.duration_minutes = duration;
        }
        if let Some(period) = patch.period {
            goal.period = period;
        }
        if let Some(deadline) = patch.deadline {
            goal.deadline = Some(deadline);
        }
        if let Some(open_ended) = patch.open_ended {
            goal.open_ended = open_ended;
        }

        db::update_goal(
            &self.pool,
            id,
            goal.duration_minutes,
            goal.period,
            goal.deadline.map(|dt| dt.naive_utc()),
            goal.open_ended,
        )
        .await?;

        self.events.emit(
            EventAction::Updated,
            "goal",
            serde_json::json!({ "id": goal.id, "owner_id": goal.owner_id }),
        );

        Ok(goal)
    }

    #[instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn delete_goal(&self, principal: &Principal, id: &str) -> Result<(), AppError> {
        let goal = db::get_goal(&self.pool, id).await?;
        require_access(principal, &goal.owner_id)?;

        db::delete_goal(&self.pool, id).await?;

        self.events.emit(
            EventAction::Deleted,
            "goal",
            serde_json::json!({ "id": goal.id, "owner_id": goal.owner_id }),
        );

        Ok(())
    }

    /// Records time for the target user (self unless a tutor logs for a
    /// supervised student or an admin for anyone). A referenced goal must
    /// exist and carry the same activity; every check runs before anything
    /// is written.
    #[instrument(skip(self, principal, payload), fields(principal_id = %principal.id))]
    pub async fn log_time(
        &self,
        principal: &Principal,
        target_user_id: Option<&str>,
        payload: NewTimeLog,
    ) -> Result<TimeLog, AppError> {
        validate_payload(&payload)?;
        self.check_activity(&payload.activity_id)?;

        let owner = resolve_target(principal, target_user_id)?;

        if let Some(goal_id) = &payload.goal_id {
            let goal = db::get_goal(&self.pool, goal_id).await?;
            // Referencing a goal requires access to its owner's records, so
            // a foreign goal id can be neither discovered nor logged against.
            require_access(principal, &goal.owner_id)?;
            if goal.activity_id != payload.activity_id {
                return Err(AppError::Validation(format!(
                    "Goal {} tracks activity {}, not {}",
                    goal_id, goal.activity_id, payload.activity_id
                )));
            }
        }

        let logged_at = payload.logged_at.unwrap_or_else(Utc::now).naive_utc();

        let log = db::insert_time_log(
            &self.pool,
            &owner,
            &payload.activity_id,
            payload.goal_id.as_deref(),
            &payload.comment,
            payload.duration_minutes,
            logged_at,
        )
        .await?;

        self.events.emit(
            EventAction::Created,
            "time_log",
            serde_json::json!({ "id": log.id, "owner_id": log.owner_id }),
        );

        Ok(log)
    }

    #[instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn get_time_logs(
        &self,
        principal: &Principal,
        student_ids: &[String],
    ) -> Result<Vec<TimeLog>, AppError> {
        let scope = scope_filter(principal, student_ids);
        db::list_time_logs(&self.pool, scope.as_deref()).await
    }

    #[instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn delete_time_log(&self, principal: &Principal, id: &str) -> Result<(), AppError> {
        let log = db::get_time_log(&self.pool, id).await?;
        require_access(principal, &log.owner_id)?;

        db::delete_time_log(&self.pool, id).await?;

        self.events.emit(
            EventAction::Deleted,
            "time_log",
            serde_json::json!({ "id": log.id, "owner_id": log.owner_id }),
        );

        Ok(())
    }

    /// Logged total over every log referencing the goal, as a percentage of
    /// the goal's target. Over-achievement is reported as-is, above 100.
    #[instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn calculate_progress(
        &self,
        principal: &Principal,
        goal_id: &str,
    ) -> Result<GoalProgress, AppError> {
        let goal = db::get_goal(&self.pool, goal_id).await?;
        require_access(principal, &goal.owner_id)?;

        let total_logged = db::sum_logged_for_goal(&self.pool, goal_id).await?;

        let raw = (total_logged as f64 / goal.duration_minutes as f64) * 100.0;
        let progress_percentage = (raw * 100.0).round() / 100.0;

        info!(goal_id = %goal_id, total_logged, progress_percentage, "Calculated goal progress");

        Ok(GoalProgress {
            goal,
            total_logged,
            progress_percentage,
        })
    }

    /// Duration sum plus matching log ids for one owner, one activity and a
    /// time window. An empty window is an empty aggregate, not an error.
    #[instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn get_aggregated_time_logs(
        &self,
        principal: &Principal,
        target_user_id: Option<&str>,
        activity_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TimeLogAggregate, AppError> {
        let owner = resolve_target(principal, target_user_id)?;
        self.check_activity(activity_id)?;

        db::aggregate_time_logs(
            &self.pool,
            &owner,
            activity_id,
            start.naive_utc(),
            end.naive_utc(),
        )
        .await
    }
}

use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::db;
use crate::error::AppError;
use crate::events::{EventAction, EventSink};
use crate::models::{Relationship, RelationshipRole, RelationshipStatus, RelationshipView};

/// Lifecycle of a (student, tutor) pair: proposed by either party as
/// `pending`, then either confirmed (which links the pair for supervision)
/// or deleted outright. Declining keeps no terminal record.
///
/// Entry points take emails, not ids: the two parties generally do not know
/// each other's internal identities. Resolution happens once here and the
/// rest of the machine is id-based.
#[derive(Clone)]
pub struct RelationshipService {
    pool: Pool<Sqlite>,
    events: EventSink,
}

impl RelationshipService {
    pub fn new(pool: Pool<Sqlite>, events: EventSink) -> Self {
        Self { pool, events }
    }

    #[instrument(skip(self))]
    pub async fn propose(
        &self,
        student_email: &str,
        tutor_email: &str,
        initiator_id: &str,
    ) -> Result<Relationship, AppError> {
        info!("Proposing relationship");
        let student = db::get_user_by_email(&self.pool, student_email).await?;
        let tutor = db::get_user_by_email(&self.pool, tutor_email).await?;

        // Existence check, not a storage constraint; racy under concurrent
        // proposals for the same pair.
        let pending = db::find_relationship(
            &self.pool,
            &student.id,
            &tutor.id,
            Some(RelationshipStatus::Pending),
        )
        .await?;

        if pending.is_some() {
            return Err(AppError::Conflict(format!(
                "A pending relationship between {} and {} already exists",
                student_email, tutor_email
            )));
        }

        let relationship =
            db::insert_relationship(&self.pool, &student.id, &tutor.id, initiator_id).await?;

        self.events.emit(
            EventAction::Created,
            "relationship",
            serde_json::json!({
                "id": relationship.id,
                "student_id": relationship.student_id,
                "tutor_id": relationship.tutor_id,
                "status": relationship.status.as_str(),
            }),
        );

        Ok(relationship)
    }

    #[instrument(skip(self))]
    pub async fn confirm(
        &self,
        student_email: &str,
        tutor_email: &str,
    ) -> Result<Relationship, AppError> {
        info!("Confirming relationship");
        let student = db::get_user_by_email(&self.pool, student_email).await?;
        let tutor = db::get_user_by_email(&self.pool, tutor_email).await?;

        let pending = db::find_relationship(
            &self.pool,
            &student.id,
            &tutor.id,
            Some(RelationshipStatus::Pending),
        )
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No pending relationship between {} and {}",
                student_email, tutor_email
            ))
        })?;

        db::confirm_relationship(&self.pool, &pending.id, &student.id, &tutor.id).await?;

        let confirmed = db::find_relationship(&self.pool, &student.id, &tutor.id, None)
            .await?
            .ok_or_else(|| {
                AppError::Internal("Relationship vanished during confirmation".to_string())
            })?;

        self.events.emit(
            EventAction::Updated,
            "relationship",
            serde_json::json!({
                "id": confirmed.id,
                "student_id": confirmed.student_id,
                "tutor_id": confirmed.tutor_id,
                "status": confirmed.status.as_str(),
            }),
        );

        Ok(confirmed)
    }

    #[instrument(skip(self))]
    pub async fn decline(&self, student_email: &str, tutor_email: &str) -> Result<(), AppError> {
        info!("Declining relationship");
        let student = db::get_user_by_email(&self.pool, student_email).await?;
        let tutor = db::get_user_by_email(&self.pool, tutor_email).await?;

        let pending = db::find_relationship(
            &self.pool,
            &student.id,
            &tutor.id,
            Some(RelationshipStatus::Pending),
        )
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No pending relationship between {} and {}",
                student_email, tutor_email
            ))
        })?;

        db::delete_relationship(&self.pool, &pending.id).await?;

        self.events.emit(
            EventAction::Deleted,
            "relationship",
            serde_json::json!({ "id": pending.id }),
        );

        Ok(())
    }

    /// Removes a relationship of any status and unlinks the pair's
    /// supervision entry.
    #[instrument(skip(self))]
    pub async fn dissolve(&self, student_email: &str, tutor_email: &str) -> Result<(), AppError> {
        info!("Dissolving relationship");
        let student = db::get_user_by_email(&self.pool, student_email).await?;
        let tutor = db::get_user_by_email(&self.pool, tutor_email).await?;

        let relationship = db::find_relationship(&self.pool, &student.id, &tutor.id, None)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No relationship between {} and {}",
                    student_email, tutor_email
                ))
            })?;

        db::dissolve_relationship(&self.pool, &relationship.id, &student.id, &tutor.id).await?;

        self.events.emit(
            EventAction::Deleted,
            "relationship",
            serde_json::json!({ "id": relationship.id }),
        );

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self, user_id: &str) -> Result<Vec<RelationshipView>, AppError> {
        let relationships = db::list_relationships_for_user(&self.pool, user_id, false).await?;
        Ok(annotate(relationships, user_id))
    }

    #[instrument(skip(self))]
    pub async fn list_pending(&self, user_id: &str) -> Result<Vec<RelationshipView>, AppError> {
        let relationships = db::list_relationships_for_user(&self.pool, user_id, true).await?;
        Ok(annotate(relationships, user_id))
    }
}

fn annotate(relationships: Vec<Relationship>, user_id: &str) -> Vec<RelationshipView> {
    relationships
        .into_iter()
        .map(|relationship| {
            let role = if relationship.student_id == user_id {
                RelationshipRole::Student
            } else {
                RelationshipRole::Tutor
            };
            RelationshipView { relationship, role }
        })
        .collect()
}

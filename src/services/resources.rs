use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{Principal, require_access, resolve_owners, scope_filter};
use crate::db;
use crate::error::AppError;
use crate::events::{EventAction, EventSink};
use crate::models::{
    BatchOutcome, Example, OwnedRecord, ResourceBody, ResourceDetail, ResourceKind,
};
use crate::validation::map_validation_errors;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResourcePatch {
    pub body: Option<ResourceBody>,
    pub comment: Option<String>,
}

/// One instance per owned-record kind. All kinds share the same policy:
/// creation fans out over the resolved owner set and silently skips owners
/// that already hold the content key; reads and writes are gated by the
/// ownership predicate.
#[derive(Clone)]
pub struct ResourceService {
    pool: Pool<Sqlite>,
    kind: ResourceKind,
    events: EventSink,
}

impl ResourceService {
    pub fn new(pool: Pool<Sqlite>, kind: ResourceKind, events: EventSink) -> Self {
        Self { pool, kind, events }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn check_kind(&self, body: &ResourceBody) -> Result<(), AppError> {
        if body.kind() != self.kind {
            return Err(AppError::Validation(format!(
                "Expected {} content, got {}",
                self.kind.as_str(),
                body.kind().as_str()
            )));
        }
        Ok(())
    }

    /// Creates the content for every owner in the resolved set. Owners that
    /// already hold this content key are skipped, never an error, so a tutor
    /// can fan one item out to many students without the batch failing.
    #[instrument(skip(self, principal, body), fields(principal_id = %principal.id, kind = %self.kind.as_str()))]
    pub async fn create(
        &self,
        principal: &Principal,
        body: ResourceBody,
        comment: &str,
        student_ids: &[String],
    ) -> Result<BatchOutcome, AppError> {
        self.check_kind(&body)?;
        body.validate().map_err(map_validation_errors)?;

        let owners = resolve_owners(principal, student_ids)?;

        let mut created = Vec::new();
        let mut skipped_owners = Vec::new();

        for owner in &owners {
            if db::resource_exists(&self.pool, owner, self.kind, body.content_key()).await? {
                info!(owner_id = %owner, content_key = %body.content_key(), "Skipping duplicate");
                skipped_owners.push(owner.clone());
                continue;
            }

            match db::insert_resource(&self.pool, owner, &body, comment).await {
                Ok(record) => {
                    self.events.emit(
                        EventAction::Created,
                        self.kind.as_str(),
                        serde_json::json!({ "id": record.id, "owner_id": record.owner_id }),
                    );
                    created.push(record);
                }
                // Lost the check-then-insert race; the unique index is the
                // real guarantee, treat it as a skip like any duplicate.
                Err(AppError::Conflict(_)) => {
                    info!(owner_id = %owner, "Skipping duplicate (concurrent insert)");
                    skipped_owners.push(owner.clone());
                }
                Err(err) => return Err(err),
            }
        }

        Ok(BatchOutcome {
            created,
            skipped_owners,
        })
    }

    #[instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn get_all(
        &self,
        principal: &Principal,
        student_ids: &[String],
    ) -> Result<Vec<OwnedRecord>, AppError> {
        let scope = scope_filter(principal, student_ids);
        db::list_resources(&self.pool, self.kind, scope.as_deref()).await
    }

    #[instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn search(
        &self,
        principal: &Principal,
        term: &str,
        student_ids: &[String],
    ) -> Result<Vec<OwnedRecord>, AppError> {
        let scope = scope_filter(principal, student_ids);
        db::search_resources(&self.pool, self.kind, scope.as_deref(), term).await
    }

    /// Absent records are NotFound; present records the caller may not see
    /// are Authorization. The two are deliberately distinct.
    #[instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn get_by_id(
        &self,
        principal: &Principal,
        id: &str,
    ) -> Result<ResourceDetail, AppError> {
        let record = db::get_resource(&self.pool, id).await?;
        require_access(principal, &record.owner_id)?;

        let examples = db::get_examples_for_resource(&self.pool, id).await?;

        Ok(ResourceDetail { record, examples })
    }

    #[instrument(skip(self, principal, patch), fields(principal_id = %principal.id))]
    pub async fn update(
        &self,
        principal: &Principal,
        id: &str,
        patch: ResourcePatch,
    ) -> Result<OwnedRecord, AppError> {
        let mut record = db::get_resource(&self.pool, id).await?;
        require_access(principal, &record.owner_id)?;

        if let Some(body) = patch.body {
            self.check_kind(&body)?;
            body.validate().map_err(map_validation_errors)?;
            record.body = body;
        }
        if let Some(comment) = patch.comment {
            record.comment = comment;
        }

        db::update_resource(&self.pool, id, &record.body, &record.comment).await?;

        self.events.emit(
            EventAction::Updated,
            self.kind.as_str(),
            serde_json::json!({ "id": record.id, "owner_id": record.owner_id }),
        );

        Ok(record)
    }

    #[instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn delete(&self, principal: &Principal, id: &str) -> Result<(), AppError> {
        let record = db::get_resource(&self.pool, id).await?;
        require_access(principal, &record.owner_id)?;

        db::delete_resource(&self.pool, id).await?;

        self.events.emit(
            EventAction::Deleted,
            self.kind.as_str(),
            serde_json::json!({ "id": record.id, "owner_id": record.owner_id }),
        );

        Ok(())
    }

    #[instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn add_example(
        &self,
        principal: &Principal,
        resource_id: &str,
        sentence: &str,
        translation: &str,
    ) -> Result<Example, AppError> {
        let record = db::get_resource(&self.pool, resource_id).await?;
        require_access(principal, &record.owner_id)?;

        db::insert_example(&self.pool, resource_id, sentence, translation).await
    }

    #[instrument(skip(self, principal), fields(principal_id = %principal.id))]
    pub async fn get_examples(
        &self,
        principal: &Principal,
        resource_id: &str,
    ) -> Result<Vec<Example>, AppError> {
        let record = db::get_resource(&self.pool, resource_id).await?;
        require_access(principal, &record.owner_id)?;

        db::get_examples_for_resource(&self.pool, resource_id).await
    }
}

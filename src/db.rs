use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::{PermissionLevel, Principal};
use crate::error::AppError;
use crate::models::{
    DbExample, DbGoal, DbOwnedRecord, DbRelationship, DbTimeLog, DbUser, Example, Goal,
    GoalPeriod, OwnedRecord, Relationship, RelationshipStatus, ResourceBody, ResourceKind,
    TimeLog, TimeLogAggregate, User,
};

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn in_placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

// --- users ---

#[instrument(skip(pool))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    display_name: &str,
    email: &str,
    level: PermissionLevel,
) -> Result<User, AppError> {
    info!("Creating new user");

    let existing = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Validation(format!(
            "Email '{}' already exists",
            email
        )));
    }

    let id = new_id();
    let now = Utc::now().naive_utc();

    sqlx::query(
        "INSERT INTO users (id, display_name, email, permission_level, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(display_name)
    .bind(email)
    .bind(level.as_level())
    .bind(now)
    .execute(pool)
    .await?;

    get_user(pool, &id).await
}

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: &str) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, display_name, email, permission_level, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn get_user_by_email(pool: &Pool<Sqlite>, email: &str) -> Result<User, AppError> {
    info!("Fetching user by email");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, display_name, email, permission_level, created_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with email {} not found in database",
            email
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn get_supervised_student_ids(
    pool: &Pool<Sqlite>,
    tutor_id: &str,
) -> Result<Vec<String>, AppError> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT student_id FROM supervisions WHERE tutor_id = ? ORDER BY student_id",
    )
    .bind(tutor_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

#[instrument(skip(pool))]
pub async fn get_tutor_ids(pool: &Pool<Sqlite>, student_id: &str) -> Result<Vec<String>, AppError> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT tutor_id FROM supervisions WHERE student_id = ? ORDER BY tutor_id",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Assembles the caller value the access checks run against: the user row
/// plus, for tutors, the supervised student ids.
#[instrument(skip(pool))]
pub async fn load_principal(pool: &Pool<Sqlite>, user_id: &str) -> Result<Principal, AppError> {
    let user = get_user(pool, user_id).await?;

    let students = match user.level {
        PermissionLevel::Tutor => get_supervised_student_ids(pool, user_id).await?,
        _ => Vec::new(),
    };

    Ok(Principal::new(user.id, user.level, students))
}

// --- relationships ---

#[instrument(skip(pool))]
pub async fn find_relationship(
    pool: &Pool<Sqlite>,
    student_id: &str,
    tutor_id: &str,
    status: Option<RelationshipStatus>,
) -> Result<Option<Relationship>, AppError> {
    let row = match status {
        Some(status) => {
            sqlx::query_as::<_, DbRelationship>(
                "SELECT id, student_id, tutor_id, status, created_by, created_at, confirmed_at
                 FROM relationships
                 WHERE student_id = ? AND tutor_id = ? AND status = ?",
            )
            .bind(student_id)
            .bind(tutor_id)
            .bind(status.as_str())
            .fetch_optional(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, DbRelationship>(
                "SELECT id, student_id, tutor_id, status, created_by, created_at, confirmed_at
                 FROM relationships
                 WHERE student_id = ? AND tutor_id = ?",
            )
            .bind(student_id)
            .bind(tutor_id)
            .fetch_optional(pool)
            .await?
        }
    };

    Ok(row.map(Relationship::from))
}

#[instrument(skip(pool))]
pub async fn insert_relationship(
    pool: &Pool<Sqlite>,
    student_id: &str,
    tutor_id: &str,
    created_by: &str,
) -> Result<Relationship, AppError> {
    info!("Inserting pending relationship");
    let id = new_id();
    let now = Utc::now().naive_utc();

    sqlx::query(
        "INSERT INTO relationships (id, student_id, tutor_id, status, created_by, created_at)
         VALUES (?, ?, ?, 'pending', ?, ?)",
    )
    .bind(&id)
    .bind(student_id)
    .bind(tutor_id)
    .bind(created_by)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Relationship {
        id,
        student_id: student_id.to_string(),
        tutor_id: tutor_id.to_string(),
        status: RelationshipStatus::Pending,
        created_by: created_by.to_string(),
        created_at: DateTime::<Utc>::from_naive_utc_and_offset(now, Utc),
        confirmed_at: None,
    })
}

/// Marks a pending relationship confirmed and links the pair in
/// `supervisions`, in one transaction. The storage layer gives us
/// multi-statement atomicity the original design lacked; the observable
/// outcome (confirmed record plus mutual linkage) is unchanged.
#[instrument(skip(pool))]
pub async fn confirm_relationship(
    pool: &Pool<Sqlite>,
    relationship_id: &str,
    student_id: &str,
    tutor_id: &str,
) -> Result<(), AppError> {
    info!("Confirming relationship");
    let now = Utc::now().naive_utc();

    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE relationships SET status = 'confirmed', confirmed_at = ? WHERE id = ?")
        .bind(now)
        .bind(relationship_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT OR IGNORE INTO supervisions (tutor_id, student_id) VALUES (?, ?)")
        .bind(tutor_id)
        .bind(student_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_relationship(pool: &Pool<Sqlite>, relationship_id: &str) -> Result<(), AppError> {
    info!("Deleting relationship");
    sqlx::query("DELETE FROM relationships WHERE id = ?")
        .bind(relationship_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Removes the relationship record and the supervision link together.
#[instrument(skip(pool))]
pub async fn dissolve_relationship(
    pool: &Pool<Sqlite>,
    relationship_id: &str,
    student_id: &str,
    tutor_id: &str,
) -> Result<(), AppError> {
    info!("Dissolving relationship");
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM relationships WHERE id = ?")
        .bind(relationship_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM supervisions WHERE tutor_id = ? AND student_id = ?")
        .bind(tutor_id)
        .bind(student_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn list_relationships_for_user(
    pool: &Pool<Sqlite>,
    user_id: &str,
    pending_only: bool,
) -> Result<Vec<Relationship>, AppError> {
    let query = if pending_only {
        "SELECT id, student_id, tutor_id, status, created_by, created_at, confirmed_at
         FROM relationships
         WHERE (student_id = ? OR tutor_id = ?) AND status = 'pending'
         ORDER BY created_at DESC"
    } else {
        "SELECT id, student_id, tutor_id, status, created_by, created_at, confirmed_at
         FROM relationships
         WHERE student_id = ? OR tutor_id = ?
         ORDER BY created_at DESC"
    };

    let rows = sqlx::query_as::<_, DbRelationship>(query)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Relationship::from).collect())
}

// --- owned resources ---

#[instrument(skip(pool))]
pub async fn resource_exists(
    pool: &Pool<Sqlite>,
    owner_id: &str,
    kind: ResourceKind,
    content_key: &str,
) -> Result<bool, AppError> {
    let existing = sqlx::query_scalar::<_, String>(
        "SELECT id FROM resources WHERE owner_id = ? AND kind = ? AND content_key = ?",
    )
    .bind(owner_id)
    .bind(kind.as_str())
    .bind(content_key)
    .fetch_optional(pool)
    .await?;

    Ok(existing.is_some())
}

#[instrument(skip(pool, body))]
pub async fn insert_resource(
    pool: &Pool<Sqlite>,
    owner_id: &str,
    body: &ResourceBody,
    comment: &str,
) -> Result<OwnedRecord, AppError> {
    info!(kind = %body.kind().as_str(), "Inserting resource");
    let id = new_id();
    let now = Utc::now().naive_utc();
    let content = body.to_json()?;

    sqlx::query(
        "INSERT INTO resources (id, owner_id, kind, content_key, content, comment, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(owner_id)
    .bind(body.kind().as_str())
    .bind(body.content_key())
    .bind(&content)
    .bind(comment)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| AppError::from_storage(e, "Resource with this content"))?;

    Ok(OwnedRecord {
        id,
        owner_id: owner_id.to_string(),
        kind: body.kind(),
        body: body.clone(),
        comment: comment.to_string(),
        created_at: DateTime::<Utc>::from_naive_utc_and_offset(now, Utc),
    })
}

#[instrument(skip(pool))]
pub async fn get_resource(pool: &Pool<Sqlite>, id: &str) -> Result<OwnedRecord, AppError> {
    let row = sqlx::query_as::<_, DbOwnedRecord>(
        "SELECT id, owner_id, kind, content_key, content, comment, created_at
         FROM resources WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(record) => OwnedRecord::try_from(record),
        _ => Err(AppError::NotFound(format!(
            "Resource with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn list_resources(
    pool: &Pool<Sqlite>,
    kind: ResourceKind,
    owners: Option<&[String]>,
) -> Result<Vec<OwnedRecord>, AppError> {
    info!("Listing resources");
    let rows = match owners {
        None => {
            sqlx::query_as::<_, DbOwnedRecord>(
                "SELECT id, owner_id, kind, content_key, content, comment, created_at
                 FROM resources WHERE kind = ? ORDER BY created_at DESC",
            )
            .bind(kind.as_str())
            .fetch_all(pool)
            .await?
        }
        Some([]) => Vec::new(),
        Some(owners) => {
            let query = format!(
                "SELECT id, owner_id, kind, content_key, content, comment, created_at
                 FROM resources WHERE kind = ? AND owner_id IN ({})
                 ORDER BY created_at DESC",
                in_placeholders(owners.len())
            );

            let mut q = sqlx::query_as::<_, DbOwnedRecord>(&query).bind(kind.as_str());
            for owner in owners {
                q = q.bind(owner);
            }
            q.fetch_all(pool).await?
        }
    };

    rows.into_iter().map(OwnedRecord::try_from).collect()
}

#[instrument(skip(pool))]
pub async fn search_resources(
    pool: &Pool<Sqlite>,
    kind: ResourceKind,
    owners: Option<&[String]>,
    term: &str,
) -> Result<Vec<OwnedRecord>, AppError> {
    info!("Searching resources");
    let pattern = format!("%{}%", term);

    let rows = match owners {
        None => {
            sqlx::query_as::<_, DbOwnedRecord>(
                "SELECT id, owner_id, kind, content_key, content, comment, created_at
                 FROM resources
                 WHERE kind = ? AND (content_key LIKE ? OR content LIKE ? OR comment LIKE ?)
                 ORDER BY created_at DESC",
            )
            .bind(kind.as_str())
            .bind(&pattern)
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(pool)
            .await?
        }
        Some([]) => Vec::new(),
        Some(owners) => {
            let query = format!(
                "SELECT id, owner_id, kind, content_key, content, comment, created_at
                 FROM resources
                 WHERE kind = ? AND owner_id IN ({})
                   AND (content_key LIKE ? OR content LIKE ? OR comment LIKE ?)
                 ORDER BY created_at DESC",
                in_placeholders(owners.len())
            );

            let mut q = sqlx::query_as::<_, DbOwnedRecord>(&query).bind(kind.as_str());
            for owner in owners {
                q = q.bind(owner);
            }
            q.bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .fetch_all(pool)
                .await?
        }
    };

    rows.into_iter().map(OwnedRecord::try_from).collect()
}

#[instrument(skip(pool, body))]
pub async fn update_resource(
    pool: &Pool<Sqlite>,
    id: &str,
    body: &ResourceBody,
    comment: &str,
) -> Result<(), AppError> {
    info!("Updating resource");
    let content = body.to_json()?;

    sqlx::query("UPDATE resources SET content_key = ?, content = ?, comment = ? WHERE id = ?")
        .bind(body.content_key())
        .bind(&content)
        .bind(comment)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| AppError::from_storage(e, "Resource with this content"))?;

    Ok(())
}

/// Attached examples go with the record via the FK cascade.
#[instrument(skip(pool))]
pub async fn delete_resource(pool: &Pool<Sqlite>, id: &str) -> Result<(), AppError> {
    info!("Deleting resource");
    sqlx::query("DELETE FROM resources WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn insert_example(
    pool: &Pool<Sqlite>,
    resource_id: &str,
    sentence: &str,
    translation: &str,
) -> Result<Example, AppError> {
    info!("Inserting example");
    let id = new_id();
    let now = Utc::now().naive_utc();

    sqlx::query(
        "INSERT INTO examples (id, resource_id, sentence, translation, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(resource_id)
    .bind(sentence)
    .bind(translation)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Example {
        id,
        resource_id: resource_id.to_string(),
        sentence: sentence.to_string(),
        translation: translation.to_string(),
        created_at: DateTime::<Utc>::from_naive_utc_and_offset(now, Utc),
    })
}

#[instrument(skip(pool))]
pub async fn get_examples_for_resource(
    pool: &Pool<Sqlite>,
    resource_id: &str,
) -> Result<Vec<Example>, AppError> {
    let rows = sqlx::query_as::<_, DbExample>(
        "SELECT id, resource_id, sentence, translation, created_at
         FROM examples WHERE resource_id = ? ORDER BY created_at",
    )
    .bind(resource_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Example::from).collect())
}

// --- goals ---

#[instrument(skip(pool))]
pub async fn insert_goal(
    pool: &Pool<Sqlite>,
    owner_id: &str,
    activity_id: &str,
    duration_minutes: i64,
    period: GoalPeriod,
    deadline: Option<NaiveDateTime>,
    open_ended: bool,
) -> Result<Goal, AppError> {
    info!("Inserting goal");
    let id = new_id();
    let now = Utc::now().naive_utc();

    sqlx::query(
        "INSERT INTO goals (id, owner_id, activity_id, duration_minutes, period, deadline, open_ended, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(owner_id)
    .bind(activity_id)
    .bind(duration_minutes)
    .bind(period.as_str())
    .bind(deadline)
    .bind(open_ended)
    .bind(now)
    .execute(pool)
    .await?;

    get_goal(pool, &id).await
}

#[instrument(skip(pool))]
pub async fn get_goal(pool: &Pool<Sqlite>, id: &str) -> Result<Goal, AppError> {
    let row = sqlx::query_as::<_, DbGoal>(
        "SELECT id, owner_id, activity_id, duration_minutes, period, deadline, open_ended, created_at
         FROM goals WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(goal) => Ok(Goal::from(goal)),
        _ => Err(AppError::NotFound(format!(
            "Goal with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn list_goals(
    pool: &Pool<Sqlite>,
    owners: Option<&[String]>,
) -> Result<Vec<Goal>, AppError> {
    info!("Listing goals");
    let rows = match owners {
        None => {
            sqlx::query_as::<_, DbGoal>(
                "SELECT id, owner_id, activity_id, duration_minutes, period, deadline, open_ended, created_at
                 FROM goals ORDER BY created_at DESC",
            )
            .fetch_all(pool)
            .await?
        }
        Some([]) => Vec::new(),
        Some(owners) => {
            let query = format!(
                "SELECT id, owner_id, activity_id, duration_minutes, period, deadline, open_ended, created_at
                 FROM goals WHERE owner_id IN ({}) ORDER BY created_at DESC",
                in_placeholders(owners.len())
            );

            let mut q = sqlx::query_as::<_, DbGoal>(&query);
            for owner in owners {
                q = q.bind(owner);
            }
            q.fetch_all(pool).await?
        }
    };

    Ok(rows.into_iter().map(Goal::from).collect())
}

#[instrument(skip(pool))]
pub async fn update_goal(
    pool: &Pool<Sqlite>,
    id: &str,
    duration_minutes: i64,
    period: GoalPeriod,
    deadline: Option<NaiveDateTime>,
    open_ended: bool,
) -> Result<(), AppError> {
    info!("Updating goal");
    sqlx::query(
        "UPDATE goals SET duration_minutes = ?, period = ?, deadline = ?, open_ended = ? WHERE id = ?",
    )
    .bind(duration_minutes)
    .bind(period.as_str())
    .bind(deadline)
    .bind(open_ended)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_goal(pool: &Pool<Sqlite>, id: &str) -> Result<(), AppError> {
    info!("Deleting goal");
    sqlx::query("DELETE FROM goals WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

// --- time logs ---

#[instrument(skip(pool))]
pub async fn insert_time_log(
    pool: &Pool<Sqlite>,
    owner_id: &str,
    activity_id: &str,
    goal_id: Option<&str>,
    comment: &str,
    duration_minutes: i64,
    logged_at: NaiveDateTime,
) -> Result<TimeLog, AppError> {
    info!("Inserting time log");
    let id = new_id();

    sqlx::query(
        "INSERT INTO time_logs (id, owner_id, activity_id, goal_id, comment, duration_minutes, logged_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(owner_id)
    .bind(activity_id)
    .bind(goal_id)
    .bind(comment)
    .bind(duration_minutes)
    .bind(logged_at)
    .execute(pool)
    .await?;

    Ok(TimeLog {
        id,
        owner_id: owner_id.to_string(),
        activity_id: activity_id.to_string(),
        goal_id: goal_id.map(String::from),
        comment: comment.to_string(),
        duration_minutes,
        logged_at: DateTime::<Utc>::from_naive_utc_and_offset(logged_at, Utc),
    })
}

#[instrument(skip(pool))]
pub async fn get_time_log(pool: &Pool<Sqlite>, id: &str) -> Result<TimeLog, AppError> {
    let row = sqlx::query_as::<_, DbTimeLog>(
        "SELECT id, owner_id, activity_id, goal_id, comment, duration_minutes, logged_at
         FROM time_logs WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(log) => Ok(TimeLog::from(log)),
        _ => Err(AppError::NotFound(format!(
            "Time log with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn list_time_logs(
    pool: &Pool<Sqlite>,
    owners: Option<&[String]>,
) -> Result<Vec<TimeLog>, AppError> {
    info!("Listing time logs");
    let rows = match owners {
        None => {
            sqlx::query_as::<_, DbTimeLog>(
                "SELECT id, owner_id, activity_id, goal_id, comment, duration_minutes, logged_at
                 FROM time_logs ORDER BY logged_at DESC",
            )
            .fetch_all(pool)
            .await?
        }
        Some([]) => Vec::new(),
        Some(owners) => {
            let query = format!(
                "SELECT id, owner_id, activity_id, goal_id, comment, duration_minutes, logged_at
                 FROM time_logs WHERE owner_id IN ({}) ORDER BY logged_at DESC",
                in_placeholders(owners.len())
            );

            let mut q = sqlx::query_as::<_, DbTimeLog>(&query);
            for owner in owners {
                q = q.bind(owner);
            }
            q.fetch_all(pool).await?
        }
    };

    Ok(rows.into_iter().map(TimeLog::from).collect())
}

#[instrument(skip(pool))]
pub async fn delete_time_log(pool: &Pool<Sqlite>, id: &str) -> Result<(), AppError> {
    info!("Deleting time log");
    sqlx::query("DELETE FROM time_logs WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Group-sum over every log referencing the goal. The filter key is indexed;
/// no pagination by design.
#[instrument(skip(pool))]
pub async fn sum_logged_for_goal(pool: &Pool<Sqlite>, goal_id: &str) -> Result<i64, AppError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(duration_minutes), 0) FROM time_logs WHERE goal_id = ?",
    )
    .bind(goal_id)
    .fetch_one(pool)
    .await?;

    Ok(total)
}

#[instrument(skip(pool))]
pub async fn aggregate_time_logs(
    pool: &Pool<Sqlite>,
    owner_id: &str,
    activity_id: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<TimeLogAggregate, AppError> {
    info!("Aggregating time logs");
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT id, duration_minutes FROM time_logs
         WHERE owner_id = ? AND activity_id = ? AND logged_at >= ? AND logged_at <= ?
         ORDER BY logged_at",
    )
    .bind(owner_id)
    .bind(activity_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let total_duration = rows.iter().map(|(_, duration)| duration).sum();
    let log_ids = rows.into_iter().map(|(id, _)| id).collect();

    Ok(TimeLogAggregate {
        total_duration,
        log_ids,
    })
}

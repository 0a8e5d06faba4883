#[cfg(test)]
mod tests {
    use crate::db::{get_supervised_student_ids, get_tutor_ids};
    use crate::error::AppError;
    use crate::events::EventSink;
    use crate::models::{RelationshipRole, RelationshipStatus};
    use crate::services::RelationshipService;
    use crate::test::utils::test_db::TestDbBuilder;

    #[tokio::test]
    async fn test_propose_creates_pending_relationship() {
        let test_db = TestDbBuilder::new()
            .student("anna@example.com", "Anna")
            .tutor("marco@example.com", "Marco")
            .build()
            .await
            .expect("Failed to build test database");

        let service = RelationshipService::new(test_db.pool.clone(), EventSink::disabled());
        let tutor_id = test_db.user_id("marco@example.com");

        let relationship = service
            .propose("anna@example.com", "marco@example.com", &tutor_id)
            .await
            .expect("Failed to propose relationship");

        assert_eq!(relationship.status, RelationshipStatus::Pending);
        assert_eq!(relationship.created_by, tutor_id);
        assert!(relationship.confirmed_at.is_none());
    }

    #[tokio::test]
    async fn test_propose_unknown_email_is_not_found() {
        let test_db = TestDbBuilder::new()
            .tutor("marco@example.com", "Marco")
            .build()
            .await
            .expect("Failed to build test database");

        let service = RelationshipService::new(test_db.pool.clone(), EventSink::disabled());
        let tutor_id = test_db.user_id("marco@example.com");

        let result = service
            .propose("nobody@example.com", "marco@example.com", &tutor_id)
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_propose_twice_is_conflict() {
        let test_db = TestDbBuilder::new()
            .student("anna@example.com", "Anna")
            .tutor("marco@example.com", "Marco")
            .build()
            .await
            .expect("Failed to build test database");

        let service = RelationshipService::new(test_db.pool.clone(), EventSink::disabled());
        let tutor_id = test_db.user_id("marco@example.com");

        service
            .propose("anna@example.com", "marco@example.com", &tutor_id)
            .await
            .expect("First proposal should succeed");

        let second = service
            .propose("anna@example.com", "marco@example.com", &tutor_id)
            .await;

        assert!(matches!(second, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_confirm_links_both_users() {
        let test_db = TestDbBuilder::new()
            .student("anna@example.com", "Anna")
            .tutor("marco@example.com", "Marco")
            .build()
            .await
            .expect("Failed to build test database");

        let service = RelationshipService::new(test_db.pool.clone(), EventSink::disabled());
        let student_id = test_db.user_id("anna@example.com");
        let tutor_id = test_db.user_id("marco@example.com");

        service
            .propose("anna@example.com", "marco@example.com", &student_id)
            .await
            .expect("Failed to propose relationship");

        let confirmed = service
            .confirm("anna@example.com", "marco@example.com")
            .await
            .expect("Failed to confirm relationship");

        assert_eq!(confirmed.status, RelationshipStatus::Confirmed);
        assert!(confirmed.confirmed_at.is_some());

        let students = get_supervised_student_ids(&test_db.pool, &tutor_id)
            .await
            .expect("Failed to load supervised students");
        assert_eq!(students, vec![student_id.clone()]);

        let tutors = get_tutor_ids(&test_db.pool, &student_id)
            .await
            .expect("Failed to load tutors");
        assert_eq!(tutors, vec![tutor_id]);
    }

    #[tokio::test]
    async fn test_confirm_twice_is_not_found() {
        let test_db = TestDbBuilder::new()
            .student("anna@example.com", "Anna")
            .tutor("marco@example.com", "Marco")
            .build()
            .await
            .expect("Failed to build test database");

        let service = RelationshipService::new(test_db.pool.clone(), EventSink::disabled());
        let tutor_id = test_db.user_id("marco@example.com");

        service
            .propose("anna@example.com", "marco@example.com", &tutor_id)
            .await
            .expect("Failed to propose relationship");
        service
            .confirm("anna@example.com", "marco@example.com")
            .await
            .expect("First confirmation should succeed");

        // No pending record remains, so a second confirmation has nothing
        // to match.
        let second = service.confirm("anna@example.com", "marco@example.com").await;
        assert!(matches!(second, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_decline_deletes_pending_record() {
        let test_db = TestDbBuilder::new()
            .student("anna@example.com", "Anna")
            .tutor("marco@example.com", "Marco")
            .build()
            .await
            .expect("Failed to build test database");

        let service = RelationshipService::new(test_db.pool.clone(), EventSink::disabled());
        let student_id = test_db.user_id("anna@example.com");

        service
            .propose("anna@example.com", "marco@example.com", &student_id)
            .await
            .expect("Failed to propose relationship");

        service
            .decline("anna@example.com", "marco@example.com")
            .await
            .expect("Failed to decline relationship");

        let remaining = service
            .list_all(&student_id)
            .await
            .expect("Failed to list relationships");
        assert!(remaining.is_empty());

        let again = service.decline("anna@example.com", "marco@example.com").await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_dissolve_removes_record_and_supervision() {
        let test_db = TestDbBuilder::new()
            .student("anna@example.com", "Anna")
            .tutor("marco@example.com", "Marco")
            .supervise("marco@example.com", "anna@example.com")
            .build()
            .await
            .expect("Failed to build test database");

        let service = RelationshipService::new(test_db.pool.clone(), EventSink::disabled());
        let student_id = test_db.user_id("anna@example.com");
        let tutor_id = test_db.user_id("marco@example.com");

        service
            .dissolve("anna@example.com", "marco@example.com")
            .await
            .expect("Failed to dissolve relationship");

        let remaining = service
            .list_all(&tutor_id)
            .await
            .expect("Failed to list relationships");
        assert!(remaining.is_empty());

        let students = get_supervised_student_ids(&test_db.pool, &tutor_id)
            .await
            .expect("Failed to load supervised students");
        assert!(students.is_empty());

        let tutors = get_tutor_ids(&test_db.pool, &student_id)
            .await
            .expect("Failed to load tutors");
        assert!(tutors.is_empty());
    }

    #[tokio::test]
    async fn test_listings_annotate_caller_role() {
        let test_db = TestDbBuilder::new()
            .student("anna@example.com", "Anna")
            .tutor("marco@example.com", "Marco")
            .build()
            .await
            .expect("Failed to build test database");

        let service = RelationshipService::new(test_db.pool.clone(), EventSink::disabled());
        let student_id = test_db.user_id("anna@example.com");
        let tutor_id = test_db.user_id("marco@example.com");

        service
            .propose("anna@example.com", "marco@example.com", &student_id)
            .await
            .expect("Failed to propose relationship");

        let as_student = service
            .list_pending(&student_id)
            .await
            .expect("Failed to list pending");
        assert_eq!(as_student.len(), 1);
        assert_eq!(as_student[0].role, RelationshipRole::Student);

        let as_tutor = service
            .list_pending(&tutor_id)
            .await
            .expect("Failed to list pending");
        assert_eq!(as_tutor.len(), 1);
        assert_eq!(as_tutor[0].role, RelationshipRole::Tutor);
    }
}

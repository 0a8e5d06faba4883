#[cfg(test)]
mod tests {
    use crate::auth::{
        PermissionLevel, Principal, may_access, resolve_owners, resolve_target, scope_filter,
    };
    use crate::error::AppError;

    fn student(id: &str) -> Principal {
        Principal::new(id, PermissionLevel::Student, vec![])
    }

    fn tutor(id: &str, students: &[&str]) -> Principal {
        Principal::new(
            id,
            PermissionLevel::Tutor,
            students.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn admin(id: &str) -> Principal {
        Principal::new(id, PermissionLevel::Admin, vec![])
    }

    #[test]
    fn test_student_may_access_only_self() {
        let p = student("s1");

        assert!(may_access(&p, "s1"));
        assert!(!may_access(&p, "s2"));
        assert!(!may_access(&p, "t1"));
    }

    #[test]
    fn test_tutor_may_access_self_and_supervised() {
        let p = tutor("t1", &["s1", "s2"]);

        assert!(may_access(&p, "t1"));
        assert!(may_access(&p, "s1"));
        assert!(may_access(&p, "s2"));
        assert!(!may_access(&p, "s3"));
    }

    #[test]
    fn test_admin_may_access_anyone() {
        let p = admin("a1");

        assert!(may_access(&p, "a1"));
        assert!(may_access(&p, "s1"));
        assert!(may_access(&p, "whoever"));
    }

    #[test]
    fn test_resolve_owners_defaults_to_self() {
        let owners = resolve_owners(&tutor("t1", &["s1"]), &[]).expect("Failed to resolve owners");
        assert_eq!(owners, vec!["t1".to_string()]);

        let owners = resolve_owners(&student("s1"), &[]).expect("Failed to resolve owners");
        assert_eq!(owners, vec!["s1".to_string()]);
    }

    #[test]
    fn test_resolve_owners_tutor_exact_when_all_supervised() {
        let requested = vec!["s1".to_string(), "s2".to_string()];
        let owners = resolve_owners(&tutor("t1", &["s1", "s2", "s3"]), &requested)
            .expect("Failed to resolve owners");

        assert_eq!(owners, requested);
    }

    #[test]
    fn test_resolve_owners_tutor_rejects_unsupervised_id() {
        let requested = vec!["s1".to_string(), "s9".to_string()];
        let result = resolve_owners(&tutor("t1", &["s1"]), &requested);

        match result {
            Err(AppError::Authorization(msg)) => {
                assert!(msg.contains("s9"), "error should name the offending id")
            }
            other => panic!("Expected Authorization error, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_owners_admin_takes_list_verbatim() {
        // Admin bypasses the supervision check tutors face.
        let requested = vec!["s1".to_string(), "s9".to_string()];
        let owners = resolve_owners(&admin("a1"), &requested).expect("Failed to resolve owners");

        assert_eq!(owners, requested);
    }

    #[test]
    fn test_resolve_owners_student_ignores_list() {
        let requested = vec!["s2".to_string()];
        let owners = resolve_owners(&student("s1"), &requested).expect("Failed to resolve owners");

        assert_eq!(owners, vec!["s1".to_string()]);
    }

    #[test]
    fn test_resolve_target_rules() {
        assert_eq!(
            resolve_target(&student("s1"), None).expect("Failed to resolve"),
            "s1"
        );
        assert_eq!(
            resolve_target(&tutor("t1", &["s1"]), Some("s1")).expect("Failed to resolve"),
            "s1"
        );
        assert_eq!(
            resolve_target(&admin("a1"), Some("s9")).expect("Failed to resolve"),
            "s9"
        );

        assert!(matches!(
            resolve_target(&student("s1"), Some("s2")),
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(
            resolve_target(&tutor("t1", &["s1"]), Some("s2")),
            Err(AppError::Authorization(_))
        ));
    }

    #[test]
    fn test_scope_filter_admin_unrestricted() {
        assert!(scope_filter(&admin("a1"), &["s1".to_string()]).is_none());
    }

    #[test]
    fn test_scope_filter_tutor_intersects_supervised() {
        let requested = vec!["s1".to_string(), "s9".to_string()];
        let scope = scope_filter(&tutor("t1", &["s1", "s2"]), &requested)
            .expect("Tutor scope should be restricted");

        assert_eq!(scope, vec!["t1".to_string(), "s1".to_string()]);
    }

    #[test]
    fn test_scope_filter_tutor_degrades_to_self_on_empty_intersection() {
        let requested = vec!["s9".to_string()];
        let scope = scope_filter(&tutor("t1", &["s1"]), &requested)
            .expect("Tutor scope should be restricted");

        assert_eq!(scope, vec!["t1".to_string()]);
    }

    #[test]
    fn test_scope_filter_student_ignores_requested_list() {
        let requested = vec!["s2".to_string(), "s3".to_string()];
        let scope =
            scope_filter(&student("s1"), &requested).expect("Student scope should be restricted");

        assert_eq!(scope, vec!["s1".to_string()]);
    }
}

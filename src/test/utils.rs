#[cfg(test)]
pub mod test_db {
    use crate::auth::{PermissionLevel, Principal};
    use crate::db::{confirm_relationship, create_user, insert_relationship, load_principal};
    use crate::error::AppError;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;

    static INIT: Once = Once::new();

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        supervisions: Vec<(String, String)>,
    }

    pub struct TestUser {
        pub email: String,
        pub display_name: String,
        pub level: PermissionLevel,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn student(mut self, email: &str, display_name: &str) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                display_name: display_name.to_string(),
                level: PermissionLevel::Student,
            });
            self
        }

        pub fn tutor(mut self, email: &str, display_name: &str) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                display_name: display_name.to_string(),
                level: PermissionLevel::Tutor,
            });
            self
        }

        pub fn admin(mut self, email: &str, display_name: &str) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                display_name: display_name.to_string(),
                level: PermissionLevel::Admin,
            });
            self
        }

        /// Sets up a confirmed relationship (and thus a supervision link)
        /// between a tutor and a student added earlier in the chain.
        pub fn supervise(mut self, tutor_email: &str, student_email: &str) -> Self {
            self.supervisions
                .push((tutor_email.to_string(), student_email.to_string()));
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder().is_test(true).try_init();
            });

            // A single connection keeps every query on the same in-memory db.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut user_id_map: HashMap<String, String> = HashMap::new();

            for user in &self.users {
                let created =
                    create_user(&pool, &user.display_name, &user.email, user.level).await?;
                user_id_map.insert(user.email.clone(), created.id);
            }

            for (tutor_email, student_email) in &self.supervisions {
                let tutor_id = user_id_map
                    .get(tutor_email)
                    .cloned()
                    .ok_or_else(|| AppError::Internal(format!("Unknown tutor {}", tutor_email)))?;
                let student_id = user_id_map.get(student_email).cloned().ok_or_else(|| {
                    AppError::Internal(format!("Unknown student {}", student_email))
                })?;

                let pending =
                    insert_relationship(&pool, &student_id, &tutor_id, &tutor_id).await?;
                confirm_relationship(&pool, &pending.id, &student_id, &tutor_id).await?;
            }

            Ok(TestDb { pool, user_id_map })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, String>,
    }

    impl TestDb {
        pub fn user_id(&self, email: &str) -> String {
            self.user_id_map
                .get(email)
                .cloned()
                .unwrap_or_else(|| panic!("No test user with email {}", email))
        }

        pub async fn principal(&self, email: &str) -> Result<Principal, AppError> {
            load_principal(&self.pool, &self.user_id(email)).await
        }
    }
}

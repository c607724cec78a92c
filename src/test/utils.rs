#[cfg(test)]
pub mod test_utils {
    use std::collections::HashMap;
    use std::sync::{Arc, Once};

    use chrono::{DateTime, Duration, Utc};
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use sqlx::{Pool, Sqlite, SqlitePool};

    use crate::auth::password::hash_password;
    use crate::auth::{MemorySessionStore, SessionPolicy, SessionStore, Sessions, SqliteSessionStore};
    use crate::bmi::compute_bmi;
    use crate::config::AppConfig;
    use crate::db::{create_user, insert_bmi_record};
    use crate::error::AppError;
    use crate::init_rocket;
    use crate::models::{BmiRecord, NewBmiRecord, UserSession};

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";
    pub const TEST_BCRYPT_COST: u32 = 4;

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        records: Vec<TestRecord>,
    }

    pub struct TestUser {
        pub username: String,
        pub password: String,
    }

    pub struct TestRecord {
        pub username: String,
        pub weight: f64,
        pub height_cm: f64,
        pub note: Option<String>,
        pub recorded_at: DateTime<Utc>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(self, username: &str) -> Self {
            self.user_with_password(username, STANDARD_PASSWORD)
        }

        pub fn user_with_password(mut self, username: &str, password: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                password: password.to_string(),
            });
            self
        }

        /// Adds a measurement taken `minutes_ago` minutes before now.
        pub fn record(
            mut self,
            username: &str,
            weight: f64,
            height_cm: f64,
            minutes_ago: i64,
            note: Option<&str>,
        ) -> Self {
            self.records.push(TestRecord {
                username: username.to_string(),
                weight,
                height_cm,
                note: note.map(String::from),
                recorded_at: Utc::now() - Duration::minutes(minutes_ago),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter("debug,sqlx=warn")
                    .with_test_writer()
                    .try_init();
            });

            let pool = SqlitePool::connect("sqlite::memory:").await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let mut conn = pool.acquire().await?;
            let mut user_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let hash = hash_password(&user.password, TEST_BCRYPT_COST)?;
                let user_id = create_user(&mut conn, &user.username, &hash).await?;

                user_id_map.insert(user.username.clone(), user_id);
            }

            for record in &self.records {
                let Some(user_id) = user_id_map.get(&record.username).copied() else {
                    continue;
                };

                let computed = compute_bmi(record.weight, record.height_cm)?;
                let new_record = NewBmiRecord {
                    weight: record.weight,
                    height_cm: record.height_cm,
                    bmi: computed.bmi,
                    category: computed.category,
                    note: record.note.clone(),
                };

                insert_bmi_record(&mut conn, user_id, &new_record, record.recorded_at).await?;
            }

            drop(conn);

            Ok(TestDb { pool, user_id_map })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }

        pub async fn record_count(&self, username: &str) -> i64 {
            let user_id = self.user_id(username).unwrap_or_default();
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bmi_records WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .expect("Failed to count records")
        }

        pub async fn records(&self, username: &str) -> Vec<BmiRecord> {
            let user_id = self.user_id(username).expect("User not found");
            let mut conn = self.pool.acquire().await.expect("Failed to acquire connection");
            crate::db::list_bmi_records(&mut conn, user_id, 1000)
                .await
                .expect("Failed to list records")
        }

        pub fn sqlite_sessions(&self) -> Sessions {
            let store: Arc<dyn SessionStore> = Arc::new(SqliteSessionStore::new(self.pool.clone()));
            Sessions::new(store, SessionPolicy::default())
        }
    }

    pub fn memory_sessions() -> Sessions {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        Sessions::new(store, SessionPolicy::default())
    }

    pub fn test_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            bcrypt_cost: TEST_BCRYPT_COST,
            ..AppConfig::default()
        }
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .user("alice")
            .user("bob")
            .record("alice", 70.0, 175.0, 30, Some("after breakfast"))
            .record("alice", 71.0, 175.0, 20, None)
            .record("bob", 100.0, 170.0, 10, None)
            .build()
            .await
            .expect("Failed to build test database")
    }

    /// A session store whose every call fails, standing in for an
    /// unreachable database.
    pub struct FailingSessionStore;

    #[rocket::async_trait]
    impl SessionStore for FailingSessionStore {
        async fn insert(&self, _session: &UserSession) -> Result<(), AppError> {
            Err(AppError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn get(&self, _token: &str) -> Result<Option<UserSession>, AppError> {
            Err(AppError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn remove(&self, _token: &str) -> Result<(), AppError> {
            Err(AppError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn purge_expired(&self) -> Result<u64, AppError> {
            Err(AppError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let sessions = test_db.sqlite_sessions();
        setup_test_client_with_sessions(test_db, sessions).await
    }

    pub async fn setup_test_client_with_sessions(
        test_db: TestDb,
        sessions: Sessions,
    ) -> (Client, TestDb) {
        let rocket = init_rocket(test_db.pool.clone(), sessions, test_config());

        let client = Client::tracked(rocket)
            .await
            .expect("Failed to build rocket client");

        (client, test_db)
    }

    /// Logs in through the form endpoint. The tracked client keeps the
    /// session cookie for later requests.
    pub async fn login_test_user(client: &Client, username: &str, password: &str) {
        let response = client
            .post("/login")
            .header(ContentType::Form)
            .body(format!("username={}&password={}", username, password))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/dashboard"));
    }
}

#[cfg(test)]
mod tests {
    use crate::auth::{INVALID_CREDENTIALS, current_user, login, logout, register};
    use crate::db::find_user_by_username;
    use crate::error::AppError;
    use crate::test::test_utils::{
        STANDARD_PASSWORD, TEST_BCRYPT_COST, TestDbBuilder, memory_sessions,
    };

    #[tokio::test]
    async fn test_register_creates_user_with_hashed_password() {
        let test_db = TestDbBuilder::new().build().await.unwrap();
        let mut conn = test_db.pool.acquire().await.unwrap();

        let user_id = register(&mut conn, "  carol  ", "s3cret", TEST_BCRYPT_COST)
            .await
            .expect("Registration should succeed");
        assert!(user_id > 0);

        let stored = find_user_by_username(&mut conn, "carol")
            .await
            .unwrap()
            .expect("Username should be stored trimmed");
        assert_eq!(stored.id, user_id);
        assert_ne!(stored.password_hash, "s3cret");
        assert!(bcrypt::verify("s3cret", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_register_duplicate_username_conflicts() {
        let test_db = TestDbBuilder::new().build().await.unwrap();
        let mut conn = test_db.pool.acquire().await.unwrap();

        register(&mut conn, "dave", "first", TEST_BCRYPT_COST)
            .await
            .expect("First registration should succeed");

        match register(&mut conn, "dave", "second", TEST_BCRYPT_COST).await {
            Err(AppError::Conflict(msg)) => assert!(msg.contains("dave")),
            other => panic!("Expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_requires_both_fields() {
        let test_db = TestDbBuilder::new().build().await.unwrap();
        let mut conn = test_db.pool.acquire().await.unwrap();

        for (username, password) in [("", "pw"), ("   ", "pw"), ("erin", "")] {
            match register(&mut conn, username, password, TEST_BCRYPT_COST).await {
                Err(AppError::Validation(_)) => {}
                other => panic!("Expected validation error, got {:?}", other),
            }
        }

        let too_long = "x".repeat(65);
        assert!(matches!(
            register(&mut conn, &too_long, "pw", TEST_BCRYPT_COST).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_login_failures_share_one_message() {
        let test_db = TestDbBuilder::new().user("alice").build().await.unwrap();
        let sessions = test_db.sqlite_sessions();
        let mut conn = test_db.pool.acquire().await.unwrap();

        let wrong_password = login(&mut conn, &sessions, "alice", "nope").await;
        let unknown_user = login(&mut conn, &sessions, "nobody", STANDARD_PASSWORD).await;

        for result in [wrong_password, unknown_user] {
            match result {
                Err(AppError::Authentication(msg)) => assert_eq!(msg, INVALID_CREDENTIALS),
                other => panic!("Expected authentication error, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_login_binds_session_to_user() {
        let test_db = TestDbBuilder::new().user("alice").build().await.unwrap();
        let sessions = test_db.sqlite_sessions();
        let mut conn = test_db.pool.acquire().await.unwrap();

        let (user, session) = login(&mut conn, &sessions, "alice", STANDARD_PASSWORD)
            .await
            .expect("Login should succeed");

        assert_eq!(Some(user.id), test_db.user_id("alice"));
        assert_eq!(session.user_id, user.id);
        assert!(session.is_valid());

        let resolved = current_user(&mut conn, &sessions, Some(session.token.as_str()))
            .await
            .unwrap()
            .expect("Session should resolve to a user");
        assert_eq!(resolved, user);
    }

    #[tokio::test]
    async fn test_logout_returns_session_to_anonymous() {
        let test_db = TestDbBuilder::new().user("alice").build().await.unwrap();
        let sessions = memory_sessions();
        let mut conn = test_db.pool.acquire().await.unwrap();

        let (_, session) = login(&mut conn, &sessions, "alice", STANDARD_PASSWORD)
            .await
            .unwrap();

        logout(&sessions, Some(session.token.as_str())).await;

        let resolved = current_user(&mut conn, &sessions, Some(session.token.as_str()))
            .await
            .unwrap();
        assert!(resolved.is_none());

        // Logging out twice, or with no session at all, is harmless.
        logout(&sessions, Some(session.token.as_str())).await;
        logout(&sessions, None).await;
    }

    #[tokio::test]
    async fn test_current_user_without_token_is_anonymous() {
        let test_db = TestDbBuilder::new().user("alice").build().await.unwrap();
        let sessions = test_db.sqlite_sessions();
        let mut conn = test_db.pool.acquire().await.unwrap();

        assert!(current_user(&mut conn, &sessions, None).await.unwrap().is_none());
        assert!(
            current_user(&mut conn, &sessions, Some("forged"))
                .await
                .unwrap()
                .is_none()
        );
    }
}

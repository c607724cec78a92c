#[cfg(test)]
mod tests {
    use serial_test::serial;

    use crate::config::{AppConfig, DEFAULT_DATABASE_URL, SessionBackend};

    const VARS: [&str; 6] = [
        "DATABASE_URL",
        "SESSION_BACKEND",
        "SESSION_TTL_MINUTES",
        "SESSION_SWEEP_INTERVAL_SECS",
        "BCRYPT_COST",
        "HISTORY_LIMIT",
    ];

    fn with_env<F: FnOnce()>(values: &[(&str, &str)], f: F) {
        let vars: Vec<(&str, Option<&str>)> = VARS
            .iter()
            .map(|name| {
                let value = values
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| *value);
                (*name, value)
            })
            .collect();

        temp_env::with_vars(vars, f);
    }

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        with_env(&[], || {
            let config = AppConfig::from_env().unwrap();

            assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
            assert_eq!(config.session_backend, SessionBackend::Sqlite);
            assert_eq!(config.session_ttl_minutes, 60);
            assert_eq!(config.bcrypt_cost, bcrypt::DEFAULT_COST);
            assert_eq!(config.history_limit, 100);
            assert_eq!(config.session_policy().ttl, chrono::Duration::minutes(60));
        });
    }

    #[test]
    #[serial]
    fn test_overrides_from_env() {
        with_env(
            &[
                ("DATABASE_URL", "sqlite::memory:"),
                ("SESSION_BACKEND", " Memory "),
                ("SESSION_TTL_MINUTES", "15"),
                ("SESSION_SWEEP_INTERVAL_SECS", "30"),
                ("BCRYPT_COST", "6"),
                ("HISTORY_LIMIT", "25"),
            ],
            || {
                let config = AppConfig::from_env().unwrap();

                assert_eq!(config.database_url, "sqlite::memory:");
                assert_eq!(config.session_backend, SessionBackend::Memory);
                assert_eq!(config.session_ttl_minutes, 15);
                assert_eq!(config.session_sweep_interval_secs, 30);
                assert_eq!(config.bcrypt_cost, 6);
                assert_eq!(config.history_limit, 25);
            },
        );
    }

    #[test]
    #[serial]
    fn test_blank_database_url_falls_back() {
        with_env(&[("DATABASE_URL", "  ")], || {
            let config = AppConfig::from_env().unwrap();
            assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        });
    }

    #[test]
    #[serial]
    fn test_bcrypt_cost_is_clamped() {
        with_env(&[("BCRYPT_COST", "1")], || {
            assert_eq!(AppConfig::from_env().unwrap().bcrypt_cost, 4);
        });

        with_env(&[("BCRYPT_COST", "40")], || {
            assert_eq!(AppConfig::from_env().unwrap().bcrypt_cost, 31);
        });
    }

    #[test]
    #[serial]
    fn test_invalid_values_are_rejected() {
        let cases: [(&str, &str); 5] = [
            ("SESSION_BACKEND", "redis"),
            ("SESSION_TTL_MINUTES", "soon"),
            ("SESSION_TTL_MINUTES", "0"),
            ("HISTORY_LIMIT", "-5"),
            ("BCRYPT_COST", "high"),
        ];

        for (name, value) in cases {
            with_env(&[(name, value)], || {
                let result = AppConfig::from_env();
                assert!(result.is_err(), "{}={} should be rejected", name, value);
            });
        }
    }

    #[test]
    #[serial]
    fn test_parse_error_names_variable() {
        with_env(&[("SESSION_TTL_MINUTES", "soon")], || {
            let err = AppConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("SESSION_TTL_MINUTES"));
        });
    }
}

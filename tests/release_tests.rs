#[cfg(test)]
mod tests {
    use bump_release::config::PollPolicy;
    use bump_release::error::ValidationError;
    use bump_release::trigger::should_release;
    use bump_release::{
        ReleaseError, Registry, RegistrySnapshot, Result, Version, await_published,
        ensure_unpublished, update_recipe, verify_published,
    };
    use std::time::Duration;

    const DIGEST: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    /// Reports a fixed latest version and digest
    struct StaticRegistry {
        latest: Option<&'static str>,
        sha256: Option<&'static str>,
    }

    impl Registry for StaticRegistry {
        fn package(&self) -> &str {
            "pythresh"
        }

        async fn snapshot(&self, _version: Option<&Version>) -> Result<RegistrySnapshot> {
            Ok(RegistrySnapshot {
                latest: self.latest.map(str::to_string),
                sha256: self.sha256.map(str::to_string),
                filename: Some("pythresh-1.3.0.tar.gz".to_string()),
            })
        }
    }

    fn short_policy() -> PollPolicy {
        PollPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            timeout: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_increment_sequence() {
        let mut version: Version = "0.9.8".parse().expect("parse");
        let mut seen = Vec::new();
        for _ in 0..3 {
            version = version.increment().expect("successor");
            seen.push(version.to_string());
        }
        assert_eq!(seen, ["0.9.9", "1.0.0", "1.0.1"]);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in ["", "1.2", "1.2.3.4", "a.b.c", "1.-2.3", "1..3", "01.02.03", "1.2.3-rc.1"] {
            assert!(Version::parse(input).is_err(), "accepted {input:?}");
        }
    }

    #[test]
    fn test_trigger_rule() {
        assert!(should_release("main", "bump version", "main", "bump"));
        assert!(should_release("refs/heads/main", "please bump", "main", "bump"));
        assert!(!should_release("dev", "bump", "main", "bump"));
        assert!(!should_release("main", "Bump", "main", "bump"));
    }

    #[test]
    fn test_recipe_preserves_unrelated_lines() {
        let recipe = "{% set name = \"pythresh\" %}\n{% set version = \"1.2.9\" %}\n\nsource:\n  url: https://example.invalid/{{ name }}-{{ version }}.tar.gz\n  sha256: deadbeef\n";
        let updated = update_recipe(recipe, &Version::new(1, 3, 0), DIGEST).expect("update");

        let expected = format!(
            "{{% set name = \"pythresh\" %}}\n{{% set version = \"1.3.0\" %}}\n\nsource:\n  url: https://example.invalid/{{{{ name }}}}-{{{{ version }}}}.tar.gz\n  sha256: {}\n",
            DIGEST
        );
        assert_eq!(updated, expected);
    }

    #[tokio::test]
    async fn test_gate_before_publish() {
        let registry = StaticRegistry {
            latest: Some("1.2.9"),
            sha256: Some(DIGEST),
        };
        let snapshot = ensure_unpublished(&registry, &Version::new(1, 3, 0))
            .await
            .expect("1.3.0 is free");
        assert_eq!(snapshot.latest.as_deref(), Some("1.2.9"));

        assert!(matches!(
            ensure_unpublished(&registry, &Version::new(1, 2, 9)).await,
            Err(ReleaseError::Validation(ValidationError::AlreadyPublished { .. }))
        ));
    }

    #[tokio::test]
    async fn test_gate_after_publish() {
        let registry = StaticRegistry {
            latest: Some("1.3.0"),
            sha256: Some(DIGEST),
        };
        let published = verify_published(&registry, &Version::new(1, 3, 0))
            .await
            .expect("live");
        assert_eq!(published.sha256, DIGEST);
        assert_eq!(published.attempts, 1);
    }

    #[tokio::test]
    async fn test_poll_times_out_on_stale_registry() {
        let registry = StaticRegistry {
            latest: Some("1.2.9"),
            sha256: Some(DIGEST),
        };
        let err = await_published(&registry, &Version::new(1, 3, 0), short_policy())
            .await
            .expect_err("never becomes live");
        assert!(matches!(
            err,
            ReleaseError::Validation(ValidationError::VersionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_poll_reports_missing_digest() {
        let registry = StaticRegistry {
            latest: Some("1.3.0"),
            sha256: None,
        };
        let err = await_published(&registry, &Version::new(1, 3, 0), short_policy())
            .await
            .expect_err("no digest");
        assert!(matches!(
            err,
            ReleaseError::Validation(ValidationError::MissingDigest { .. })
        ));
    }
}

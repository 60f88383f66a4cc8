use std::path::Path;

use figment::providers::{Format, Toml};
use figment::{Figment, Jail};
use tutor_core::config::{resolve_with_base, Config};

#[test]
fn missing_files_fall_back_to_defaults() {
    let tmp = tempfile::TempDir::new().unwrap();
    let config = Config::load_for_env(tmp.path(), "dev").expect("load");
    let settings = config.settings().expect("settings");

    assert_eq!(settings.retrieval.top_k, 5);
    assert_eq!(settings.retrieval.multi_query.variants, 3);
    assert_eq!(settings.cache.max_size, 500);
}

#[test]
fn env_file_and_variables_layer_over_base() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [retrieval]
            top_k = 4

            [breaker]
            failure_threshold = 3
            "#,
        )?;
        jail.create_file(
            "config.test.toml",
            r#"
            [retrieval.hybrid]
            rrf_k = 30.0
            "#,
        )?;
        jail.set_env("APP_BREAKER__FAILURE_THRESHOLD", "7");

        let config = Config::load_for_env(jail.directory(), "test").map_err(|e| e.to_string())?;
        let settings = config.settings().map_err(|e| e.to_string())?;

        assert_eq!(settings.retrieval.top_k, 4, "base file applies");
        assert_eq!(settings.retrieval.hybrid.rrf_k, 30.0, "env file applies");
        assert_eq!(settings.breaker.failure_threshold, 7, "env vars win");
        assert_eq!(config.get::<usize>("retrieval.top_k").map_err(|e| e.to_string())?, 4);
        Ok(())
    });
}

#[test]
fn prebuilt_figment_is_used_as_is() {
    let figment = Figment::from(Toml::string("[retrieval]\ntop_k = 9\n\n[llm]\nmodel = \"llama3.2\"\n"));
    let config = Config::from_figment(figment);

    assert_eq!(config.settings().unwrap().retrieval.top_k, 9);
    assert_eq!(config.get::<String>("llm.model").unwrap(), "llama3.2");
    assert!(config.get::<String>("llm.ollama_url").is_err());
}

#[test]
fn invalid_values_fail_at_load_time() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[cache]\nmax_size = 0\n")?;
        let err = match Config::load_for_env(jail.directory(), "dev") {
            Ok(_) => return Err("zero cache size must be rejected".to_string().into()),
            Err(e) => e,
        };
        assert!(err.to_string().contains("cache.max_size"));
        Ok(())
    });
}

#[test]
fn production_requires_user_agent_for_external_lookups() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[external]\nenabled = true\n")?;
        assert!(Config::load_for_env(jail.directory(), "prod").is_err());

        jail.set_env("APP_EXTERNAL__USER_AGENT", "CourseTutor/1.0 (https://example.org; tutor@example.org)");
        assert!(Config::load_for_env(jail.directory(), "prod").is_ok());
        Ok(())
    });
}

#[test]
fn resolve_with_base_keeps_absolute_paths() {
    let base = Path::new("/srv/tutor");
    assert_eq!(resolve_with_base(base, "storage"), Path::new("/srv/tutor/storage"));
    assert_eq!(resolve_with_base(base, "/var/index"), Path::new("/var/index"));
}

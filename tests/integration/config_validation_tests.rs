//! Configuration validation integration tests
//!
//! Loading from YAML files and environment overrides, including the batch
//! limit rules that must fail at load time.

#[cfg(test)]
mod tests {
    use crate::assert_err;
    use odata_batch::config::Config;
    use odata_batch::config::models::GatewayConfig;
    use odata_batch::core::batch::BatchError;
    use odata_batch::utils::error::GatewayError;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[tokio::test]
    async fn test_full_config_file_loads() {
        let file = write_config(
            r#"
server:
  host: "127.0.0.1"
  port: 9090
  max_body_size: 1048576
batch:
  service_root: "https://example.com/svc/"
  max_batch_count: 5
  max_changeset_count: 0
  concurrent_elements: true
store:
  entity_sets: ["People"]
logging:
  level: "debug"
  json: true
"#,
        );

        let config = Config::from_file(file.path()).await.unwrap();
        assert_eq!(config.server().address(), "127.0.0.1:9090");
        assert!(config.batch().concurrent_elements);
        assert_eq!(config.store().entity_sets, vec!["People".to_string()]);

        let limits = config.limits().unwrap();
        assert_eq!(limits.max_batch_count, 5);
        assert_eq!(limits.max_changeset_count, 0);
    }

    #[tokio::test]
    async fn test_negative_limit_fails_at_load() {
        let file = write_config("batch:\n  max_batch_count: -1\n");

        let error = assert_err!(Config::load(Some(file.path())).await);
        assert!(matches!(
            error,
            GatewayError::Batch(BatchError::InvalidLimitConfiguration {
                name: "max_batch_count",
                value: -1
            })
        ));
    }

    #[test]
    fn test_negative_limit_from_environment_fails_validation() {
        let mut gateway = GatewayConfig::default();
        gateway
            .apply_env_overrides(env(&[("BATCH_MAX_CHANGESET_COUNT", "-3")]))
            .unwrap();

        let config = Config { gateway };
        let error = assert_err!(config.validate());
        assert!(matches!(
            error,
            GatewayError::Batch(BatchError::InvalidLimitConfiguration { value: -3, .. })
        ));
    }

    #[test]
    fn test_environment_overrides_file_values() {
        let mut config = Config::from_yaml("batch:\n  max_batch_count: 5\n").unwrap();
        config
            .gateway
            .apply_env_overrides(env(&[
                ("BATCH_MAX_BATCH_COUNT", "7"),
                ("BATCH_SERVICE_ROOT", "http://api.local/v4/"),
                ("BATCH_CONCURRENT_ELEMENTS", "true"),
            ]))
            .unwrap();
        config.validate().unwrap();

        assert_eq!(config.batch().max_batch_count, 7);
        assert_eq!(
            config.batch().service_root_url().unwrap().as_str(),
            "http://api.local/v4/"
        );
        assert!(config.batch().concurrent_elements);
    }

    #[test]
    fn test_unparseable_environment_value_is_config_error() {
        let mut gateway = GatewayConfig::default();
        let error = assert_err!(gateway.apply_env_overrides(env(&[("BATCH_PORT", "eighty")])));
        assert!(matches!(error, GatewayError::Config(message) if message.contains("BATCH_PORT")));
    }

    #[test]
    fn test_invalid_sections_are_rejected() {
        assert!(Config::from_yaml("batch:\n  service_root: \"ftp://host/\"\n").is_err());
        assert!(Config::from_yaml("store:\n  entity_sets: [\"A\", \"A\"]\n").is_err());
        assert!(Config::from_yaml("server:\n  port: 0\n").is_err());
    }

    #[test]
    fn test_yaml_round_trip_keeps_values() {
        let config = Config::from_yaml("batch:\n  max_changeset_count: 12\n").unwrap();
        let reloaded = Config::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(reloaded, config);
    }
}

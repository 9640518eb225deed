use chatlink::config::Config;
use std::time::Duration;

fn base_config() -> Config {
    Config {
        base_url: "http://localhost:8080/be/v1".to_string(),
        agent_id: "agent-support".to_string(),
        user_id: "user-1".to_string(),
        idle_timeout_secs: 120,
    }
}

#[test]
fn test_config_validation_accepts_the_default_shape() {
    assert!(base_config().validate().is_ok());
}

#[test]
fn test_config_validation_rejects_non_http_base_url() {
    let config = Config {
        base_url: "ftp://chat.internal/be/v1".to_string(),
        ..base_config()
    };

    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_rejects_blank_agent_id() {
    let config = Config {
        agent_id: "   ".to_string(),
        ..base_config()
    };

    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_rejects_blank_user_id() {
    let config = Config {
        user_id: String::new(),
        ..base_config()
    };

    assert!(config.validate().is_err());
}

#[test]
fn test_chat_endpoint_joins_base_url_and_agent() {
    let config = Config {
        base_url: "http://localhost:8080/be/v1/".to_string(),
        ..base_config()
    };

    assert_eq!(
        config.chat_endpoint(),
        "http://localhost:8080/be/v1/chatagents/agent-support"
    );
}

#[test]
fn test_idle_timeout_zero_disables_the_deadline() {
    let config = Config {
        idle_timeout_secs: 0,
        ..base_config()
    };

    assert!(config.idle_timeout().is_none());
}

#[test]
fn test_idle_timeout_converts_seconds() {
    assert_eq!(base_config().idle_timeout(), Some(Duration::from_secs(120)));
}

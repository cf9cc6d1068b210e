//! Configuration and policy file loading

use icom_authz::{AuthzConfig, AuthzError, AuthzService, PolicyDocument, ReasonCode};
use icom_authz::session::{encode_unsigned, Claims, SessionMode};
use icom_core::{Channel, NetworkType, Realm};
use std::io::Write;
use tempfile::NamedTempFile;
use tokio_test::{assert_err, assert_ok};

const CITIZEN_ONLY_POLICY: &str = r#"
[requirements]
chat = ["icom:chat:send"]

[[rule]]
from = "citizen"
to = "citizen"
allow = ["chat"]
"#;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn citizen_token() -> String {
    let now = chrono::Utc::now().timestamp();
    encode_unsigned(&Claims {
        sub: "citizen-1".to_string(),
        app_id: "portal".to_string(),
        tenant_id: "public".to_string(),
        mode: SessionMode::Service,
        realm: Realm::Citizen,
        network_type: NetworkType::Commercial,
        scope: vec!["icom:chat:send".to_string(), "icom:call:use".to_string()],
        act: None,
        jti: "tok-citizen".to_string(),
        iat: now,
        exp: now + 600,
    })
}

#[test]
fn test_load_config_file() {
    let file = write_temp(
        r#"
        [session]
        ttl_secs = 900
        refresh_grace_secs = 60

        [engine]
        cache_capacity = 500

        [server]
        host = "127.0.0.1"
        port = 18080
        metrics_port = 19090
        "#,
    );

    let config = AuthzConfig::load(file.path()).unwrap();
    assert_eq!(config.session.ttl_secs, 900);
    assert_eq!(config.session.prune_interval_secs, 300);
    assert_eq!(config.engine.cache_capacity, 500);
    assert!(config.engine.enable_metrics);
    assert_eq!(config.server.host, "127.0.0.1");
    assert!(config.policy.path.is_none());
    assert_ok!(config.validate());
}

#[test]
fn test_invalid_config_file() {
    let file = write_temp("[session]\nttl_secs = \"soon\"\n");
    assert!(matches!(AuthzConfig::load(file.path()), Err(AuthzError::Config(_))));
}

#[test]
fn test_service_uses_configured_policy_file() {
    let policy = write_temp(CITIZEN_ONLY_POLICY);
    let config = AuthzConfig::from_toml_str(&format!(
        "[policy]\npath = {:?}\n",
        policy.path().display().to_string()
    ))
    .unwrap();

    let service = AuthzService::from_config(&config).unwrap();
    let token = citizen_token();

    assert!(service
        .can_communicate_with_token(&token, Realm::Citizen, Channel::Chat)
        .allowed);
    assert_eq!(
        service
            .can_communicate_with_token(&token, Realm::Citizen, Channel::Call)
            .reason_code,
        ReasonCode::RealmPolicyDenied
    );
}

#[test]
fn test_service_rejects_invalid_policy_file() {
    let policy = write_temp(
        r#"
        [[rule]]
        from = "citizen"
        to = "citizen"
        allow = ["chat"]
        "#,
    );

    let mut config = AuthzConfig::default();
    config.policy.path = Some(policy.path().to_path_buf());

    assert!(matches!(
        AuthzService::from_config(&config),
        Err(AuthzError::InvalidPolicy(_))
    ));
}

#[test]
fn test_service_rejects_invalid_config() {
    let mut config = AuthzConfig::default();
    config.engine.cache_ttl_secs = 0;
    assert_err!(AuthzService::from_config(&config));
}

#[test]
fn test_replace_policy_from_file() {
    let service = AuthzService::from_config(&AuthzConfig::default()).unwrap();
    let token = citizen_token();
    assert!(service
        .can_communicate_with_token(&token, Realm::Citizen, Channel::Call)
        .allowed);

    let policy = write_temp(CITIZEN_ONLY_POLICY);
    let version = service
        .replace_policy(PolicyDocument::load(policy.path()).unwrap())
        .unwrap();

    assert_eq!(version, 2);
    assert_eq!(
        service
            .can_communicate_with_token(&token, Realm::Citizen, Channel::Call)
            .reason_code,
        ReasonCode::RealmPolicyDenied
    );
}

#[test]
fn test_service_rejects_oversized_session_ttl() {
    let config = AuthzConfig::from_toml_str("[session]\nttl_secs = 100000000000000000\n").unwrap();
    assert!(matches!(
        AuthzService::from_config(&config),
        Err(AuthzError::Config(_))
    ));
}

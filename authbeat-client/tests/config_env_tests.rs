//! Environment-variable fallback. Kept in its own binary so no other test
//! observes the mutated environment.

use authbeat_client::{AuthClient, AuthError, ClientConfig, ManualClock, SECRET_ENV_VAR};
use std::sync::Arc;

mod common;
use common::*;

#[test]
fn secret_falls_back_to_environment() {
    let config = ClientConfig::new("https://license.test", "TestApp");

    unsafe { std::env::remove_var(SECRET_ENV_VAR) };
    assert!(matches!(
        config.resolve_secret(),
        Err(AuthError::Configuration(_))
    ));

    unsafe { std::env::set_var(SECRET_ENV_VAR, "") };
    assert!(config.resolve_secret().is_err());

    unsafe { std::env::set_var(SECRET_ENV_VAR, "from-env") };
    assert_eq!(config.resolve_secret().unwrap(), "from-env");

    let explicit = ClientConfig {
        client_secret: Some("explicit".into()),
        ..config.clone()
    };
    assert_eq!(explicit.resolve_secret().unwrap(), "explicit");

    // A client built without an explicit secret talks to a server using the env one.
    unsafe { std::env::set_var(SECRET_ENV_VAR, SECRET) };
    let dir = tempfile::TempDir::new().unwrap();
    let config = ClientConfig {
        client_secret: None,
        ..test_config(&dir)
    };
    let clock = Arc::new(ManualClock::new(T0));
    let client = client_with(config, FakeServer::new(true, "ok"), &clock);
    assert!(client.check_authorization().authorized);

    unsafe { std::env::remove_var(SECRET_ENV_VAR) };
    let dir = tempfile::TempDir::new().unwrap();
    let config = ClientConfig {
        client_secret: None,
        ..test_config(&dir)
    };
    let clock: Arc<dyn authbeat_client::Clock> = Arc::new(ManualClock::new(T0));
    let result = AuthClient::with_parts(config, Box::new(Unreachable), clock);
    assert!(matches!(result, Err(AuthError::Configuration(_))));
}

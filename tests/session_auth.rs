mod support;

use std::sync::Arc;

use leaderboard_widget::auth::{HttpTokenIssuer, TokenIssuer};
use leaderboard_widget::session::{Session, SessionEvent};
use leaderboard_widget::{Credentials, WidgetConfig};

use support::{MockConnector, MockGateway, Script};

async fn issuer_for(api_key: &str) -> HttpTokenIssuer {
    let url = support::spawn_token_server().await;
    let mut config = WidgetConfig::new(api_key);
    config.auth_url = url;
    HttpTokenIssuer::new(&config).expect("issuer")
}

#[tokio::test]
async fn member_tokens_are_issued_for_reference_ids() {
    let issuer = issuer_for("good-key").await;
    let issued = issuer
        .issue(&Credentials::for_member("m-7"))
        .await
        .expect("token");
    assert_eq!(issued.token, "jwt-for-m-7");
}

#[tokio::test]
async fn anonymous_visitors_get_public_tokens() {
    let issuer = issuer_for("good-key").await;
    let issued = issuer.issue(&Credentials::default()).await.expect("token");
    assert_eq!(issued.token, "jwt-for-PUBLIC");
}

#[tokio::test]
async fn reply_without_token_is_an_auth_failure() {
    let issuer = issuer_for("wrong-key").await;
    let err = issuer
        .issue(&Credentials::for_member("m-7"))
        .await
        .expect_err("no token");
    assert!(err.is_auth());
}

#[tokio::test]
async fn unreachable_endpoint_is_an_auth_failure() {
    let port = portpicker::pick_unused_port().expect("free port");
    let mut config = WidgetConfig::new("good-key");
    config.auth_url = format!("http://127.0.0.1:{port}/member-token");
    let issuer = HttpTokenIssuer::new(&config).expect("issuer");
    let err = issuer
        .issue(&Credentials::default())
        .await
        .expect_err("connection refused");
    assert!(err.is_auth());
}

#[tokio::test]
async fn session_connects_through_the_http_issuer() {
    let issuer = issuer_for("good-key").await;
    let connector = MockConnector::new(MockGateway::new(Script::default()));
    let (session, mut events) = Session::new(Arc::new(issuer), connector.clone());

    session
        .connect(Credentials::for_member("m-1"))
        .await
        .expect("connected");
    assert!(session.is_connected());
    assert!(matches!(events.recv().await, Some(SessionEvent::Connected)));

    session
        .refresh_credentials(Credentials::for_member("m-2"))
        .await
        .expect("reconnected");
    assert_eq!(connector.opens(), 2);
    assert!(matches!(events.recv().await, Some(SessionEvent::Connected)));

    assert!(session.disconnect().await);
    assert!(!session.disconnect().await);
    assert!(!session.is_connected());
}

#[tokio::test]
async fn rejected_issuer_reports_auth_failure_event() {
    let issuer = issuer_for("wrong-key").await;
    let connector = MockConnector::new(MockGateway::new(Script::default()));
    let (session, mut events) = Session::new(Arc::new(issuer), connector.clone());

    let err = session
        .connect(Credentials::for_member("m-1"))
        .await
        .err()
        .expect("rejected");
    assert!(err.is_auth());
    assert!(matches!(events.recv().await, Some(SessionEvent::AuthFailed(_))));
    assert_eq!(connector.opens(), 0);
    assert!(!session.is_connected());
}

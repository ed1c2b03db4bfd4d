//! Webhook subscription inventory tests

use pdprov_core::ErrorKind;
use pdprov_core::inventory::{
    activate_all, find_inactive, read_activation_path, write_activation_path,
};
use pdprov_test_utils::{MockDirectoryClient, MockFailure, MockOperation};
use tempfile::TempDir;

fn directory() -> MockDirectoryClient {
    MockDirectoryClient::new()
        .with_subscription("PS1", "Slack", true)
        .with_subscription("PS2", "Jira, prod", false)
        .with_subscription("PS3", "Status page", false)
}

#[tokio::test]
async fn test_export_writes_only_inactive_subscriptions() {
    let mock = directory();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("inactive_subscriptions.csv");

    let inactive = find_inactive(&mock).await.unwrap();
    write_activation_path(&path, &inactive).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        written,
        "subscription_id,description\nPS2,\"Jira, prod\"\nPS3,Status page\n"
    );
}

#[tokio::test]
async fn test_exported_file_feeds_activation() {
    let mock = directory();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("inactive_subscriptions.csv");

    let inactive = find_inactive(&mock).await.unwrap();
    write_activation_path(&path, &inactive).unwrap();
    let ids = read_activation_path(&path).unwrap();
    let report = activate_all(&mock, &ids).await;

    assert_eq!(report.activated, vec!["PS2", "PS3"]);
    assert!(report.failed.is_empty());
    assert!(mock.subscriptions().iter().all(|s| s.active));
}

#[tokio::test]
async fn test_activation_failures_are_isolated() {
    let mock = directory();
    mock.fail_when(
        MockOperation::ActivateWebhookSubscription,
        "PS2",
        MockFailure::Unauthorized,
    );
    let ids = vec!["PS2".to_string(), "PS3".to_string(), "PS404".to_string()];

    let report = activate_all(&mock, &ids).await;

    assert_eq!(report.activated, vec!["PS3"]);
    assert_eq!(report.failed.len(), 2);
    assert_eq!(report.failed[0].id, "PS2");
    assert_eq!(report.failed[0].error.kind(), ErrorKind::Unauthorized);
    assert_eq!(report.failed[1].error.kind(), ErrorKind::NotFound);
}

#[test]
fn test_missing_activation_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let error = read_activation_path(&dir.path().join("absent.csv")).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Io);
    assert!(error.to_string().contains("absent.csv"));
}

//! Reconciliation engine tests against the in-memory directory

use pdprov_core::engine::{ChannelOutcome, EngineConfig, ReconciliationEngine, Step, TeamOutcome};
use pdprov_core::error::{DeclineStage, Error, ErrorKind, ErrorScope, IoError};
use pdprov_core::gate::{AutoConfirm, ConfirmationGate};
use pdprov_core::records::{ReaderMode, RecordReader, RowRejected};
use pdprov_core::{ContactChannel, RecordStatus, RunContext, TeamRole};
use pdprov_test_utils::{
    ImportRecordBuilder, MockCall, MockDirectoryClient, MockFailure, MockOperation,
    RecordingObserver, fixtures,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Gate that answers from a script and remembers what it was asked
struct ScriptedGate {
    answers: Mutex<VecDeque<bool>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGate {
    fn new(answers: &[bool]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl ConfirmationGate for ScriptedGate {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers.lock().unwrap().pop_front().unwrap_or(false)
    }
}

fn engine_with(
    mock: &Arc<MockDirectoryClient>,
    gate: Arc<dyn ConfirmationGate>,
    config: EngineConfig,
) -> ReconciliationEngine {
    ReconciliationEngine::new(
        mock.clone(),
        gate,
        config,
        RunContext::new(Some("admin@example.com".to_string()), Some("acme".to_string())),
    )
}

fn engine(mock: &Arc<MockDirectoryClient>) -> ReconciliationEngine {
    engine_with(mock, Arc::new(AutoConfirm::accept()), EngineConfig::default())
}

fn membership_roles(mock: &MockDirectoryClient, user_id: &str) -> Vec<(String, TeamRole)> {
    let teams = mock.teams();
    mock.memberships()
        .into_iter()
        .filter(|m| m.user_id == user_id)
        .map(|m| {
            let name = teams
                .iter()
                .find(|t| t.id == m.team_id)
                .map(|t| t.name.clone())
                .unwrap_or_default();
            (name, m.role)
        })
        .collect()
}

#[tokio::test]
async fn test_processing_same_record_twice_creates_user_once() {
    let mock = Arc::new(MockDirectoryClient::new().with_team("Ops"));
    let mut engine = engine(&mock);
    let record = fixtures::user_on_team("ada@example.com", "Ops");

    let first = engine.process(record.clone()).await;
    let second = engine.process(record).await;

    assert_eq!(first.status(), RecordStatus::Succeeded);
    assert_eq!(second.status(), RecordStatus::Succeeded);
    assert!(first.user.as_ref().unwrap().created);
    assert!(!second.user.as_ref().unwrap().created);
    assert_eq!(mock.call_count(MockOperation::CreateUser), 1);
    assert_eq!(mock.users().len(), 1);
    assert_eq!(mock.memberships().len(), 1);
}

#[tokio::test]
async fn test_new_user_gets_defaults() {
    let mock = Arc::new(MockDirectoryClient::new());
    let mut engine = engine(&mock);

    let outcome = engine
        .process(ImportRecordBuilder::new("grace@example.com").with_name("Grace").build())
        .await;

    assert_eq!(outcome.status(), RecordStatus::Succeeded);
    assert_eq!(
        mock.calls()[1],
        MockCall::CreateUser {
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
            role: "user".to_string(),
            title: " ".to_string(),
        }
    );
}

#[tokio::test]
async fn test_positional_overrides_over_three_teams() {
    let mock = Arc::new(
        MockDirectoryClient::new()
            .with_team("A")
            .with_team("B")
            .with_team("C"),
    );
    let mut engine = engine(&mock);
    let record = ImportRecordBuilder::new("ada@example.com")
        .with_role("user")
        .with_teams(&["A", "B", "C"])
        .with_team_roles(&["responder", "", "observer"])
        .build();

    let outcome = engine.process(record).await;
    let user_id = outcome.user.as_ref().unwrap().user_id.clone();

    assert_eq!(
        membership_roles(&mock, &user_id),
        vec![
            ("A".to_string(), TeamRole::Responder),
            ("B".to_string(), TeamRole::Manager),
            ("C".to_string(), TeamRole::Observer),
        ]
    );
}

#[tokio::test]
async fn test_single_override_and_privileged_roles() {
    let mock = Arc::new(MockDirectoryClient::new().with_team("A").with_team("B"));
    let mut engine = engine(&mock);

    let responder = engine
        .process(
            ImportRecordBuilder::new("user@example.com")
                .with_teams(&["A", "B"])
                .with_team_roles(&["responder"])
                .build(),
        )
        .await;
    let admin = engine
        .process(
            ImportRecordBuilder::new("admin@example.com")
                .with_role("admin")
                .with_teams(&["A", "B"])
                .with_team_roles(&["observer"])
                .build(),
        )
        .await;

    let responder_id = responder.user.unwrap().user_id;
    let admin_id = admin.user.unwrap().user_id;
    assert!(
        membership_roles(&mock, &responder_id)
            .iter()
            .all(|(_, role)| *role == TeamRole::Responder)
    );
    assert!(
        membership_roles(&mock, &admin_id)
            .iter()
            .all(|(_, role)| *role == TeamRole::Manager)
    );
}

#[tokio::test]
async fn test_existing_user_remote_role_drives_team_role() {
    let mock = Arc::new(
        MockDirectoryClient::new()
            .with_user("Reader", "reader@example.com", "read_only_user")
            .with_team("Ops"),
    );
    let mut engine = engine(&mock);
    let record = ImportRecordBuilder::new("reader@example.com")
        .with_teams(&["Ops"])
        .with_team_roles(&["manager"])
        .build();

    let outcome = engine.process(record).await;

    assert_eq!(outcome.status(), RecordStatus::Succeeded);
    assert_eq!(mock.memberships()[0].role, TeamRole::Observer);
}

#[tokio::test]
async fn test_missing_team_is_skipped_when_creation_disabled() {
    let mock = Arc::new(MockDirectoryClient::new());
    let config = EngineConfig {
        create_missing_teams: false,
        ..EngineConfig::default()
    };
    let mut engine = engine_with(&mock, Arc::new(AutoConfirm::accept()), config);

    let outcome = engine
        .process(fixtures::user_on_team("ada@example.com", "Nowhere"))
        .await;

    assert_eq!(outcome.status(), RecordStatus::SucceededWithSkips);
    assert_eq!(
        outcome.teams,
        vec![TeamOutcome::Skipped {
            index: 0,
            team_name: "Nowhere".to_string(),
        }]
    );
    assert_eq!(mock.call_count(MockOperation::CreateTeam), 0);
    assert_eq!(mock.call_count(MockOperation::AddUserToTeam), 0);
}

#[tokio::test]
async fn test_missing_team_is_created_once_and_cached() {
    let mock = Arc::new(MockDirectoryClient::new());
    let mut engine = engine(&mock);

    for record in fixtures::numbered_users(3, "New Team") {
        let outcome = engine.process(record).await;
        assert_eq!(outcome.status(), RecordStatus::Succeeded);
    }

    assert_eq!(mock.call_count(MockOperation::CreateTeam), 1);
    assert_eq!(mock.call_count(MockOperation::FindTeamsByName), 1);
    assert_eq!(mock.call_count(MockOperation::AddUserToTeam), 3);
}

#[tokio::test]
async fn test_team_lookup_is_exact_and_case_insensitive() {
    let mock = Arc::new(
        MockDirectoryClient::new()
            .with_team("Ops Europe")
            .with_team("Ops"),
    );
    let mut engine = engine(&mock);

    let outcome = engine
        .process(fixtures::user_on_team("ada@example.com", "  ops "))
        .await;

    match &outcome.teams[0] {
        TeamOutcome::Joined {
            team_name,
            team_created,
            ..
        } => {
            assert_eq!(team_name, "Ops");
            assert!(!team_created);
        }
        other => panic!("unexpected team outcome: {other:?}"),
    }
    assert_eq!(mock.call_count(MockOperation::CreateTeam), 0);
}

#[tokio::test]
async fn test_blank_team_names_keep_override_positions() {
    let mock = Arc::new(MockDirectoryClient::new().with_team("A").with_team("C"));
    let mut engine = engine(&mock);
    let record = ImportRecordBuilder::new("ada@example.com")
        .with_teams(&["A", "", "C"])
        .with_team_roles(&["responder", "manager", "observer"])
        .build();

    let outcome = engine.process(record).await;
    let user_id = outcome.user.unwrap().user_id;

    assert_eq!(
        membership_roles(&mock, &user_id),
        vec![
            ("A".to_string(), TeamRole::Responder),
            ("C".to_string(), TeamRole::Observer),
        ]
    );
}

#[tokio::test]
async fn test_no_phone_means_no_contact_methods() {
    let mock = Arc::new(MockDirectoryClient::new());
    let mut engine = engine(&mock);

    let outcome = engine
        .process(
            ImportRecordBuilder::new("ada@example.com")
                .with_phone("1", "")
                .build(),
        )
        .await;

    assert_eq!(outcome.status(), RecordStatus::Succeeded);
    assert_eq!(mock.call_count(MockOperation::AddContactMethod), 0);
    assert_eq!(mock.call_count(MockOperation::AddNotificationRule), 0);
    assert!(
        outcome
            .channels
            .iter()
            .all(|c| matches!(c, ChannelOutcome::Skipped { .. }))
    );
}

#[tokio::test]
async fn test_phone_gets_retry_rule_and_sms_does_not() {
    let mock = Arc::new(MockDirectoryClient::new().with_team("Ops").with_team("Infra"));
    let mut engine = engine(&mock);

    let outcome = engine
        .process(fixtures::responder_with_phone("ada@example.com"))
        .await;
    assert_eq!(outcome.status(), RecordStatus::Succeeded);

    let user_id = outcome.user.as_ref().unwrap().user_id.clone();
    let methods = mock.contact_methods_for(&user_id);
    assert_eq!(methods.len(), 2);
    assert!(methods.iter().all(|m| m.label.as_deref() == Some("Mobile")));

    let rules = mock.notification_rules_for(&user_id);
    let delays_for = |contact_type: &str| -> Vec<u32> {
        rules
            .iter()
            .filter(|r| r.contact_method.contact_type == contact_type)
            .map(|r| r.start_delay_in_minutes)
            .collect()
    };
    assert_eq!(delays_for("sms_contact_method"), vec![0]);
    assert_eq!(delays_for("phone_contact_method"), vec![0, 3]);
    assert_eq!(outcome.notification_rules_created(), 3);
}

#[tokio::test]
async fn test_existing_contact_method_is_not_duplicated() {
    let mock = Arc::new(
        MockDirectoryClient::new()
            .with_user("Ada", "ada@example.com", "limited_user")
            .with_contact_method("ada@example.com", ContactChannel::Sms, "555-0100")
            .with_team("Ops")
            .with_team("Infra"),
    );
    let mut engine = engine(&mock);

    let outcome = engine
        .process(fixtures::responder_with_phone("ada@example.com"))
        .await;

    assert_eq!(outcome.status(), RecordStatus::Succeeded);
    assert!(matches!(
        outcome.channels[0],
        ChannelOutcome::AlreadyPresent {
            channel: ContactChannel::Sms,
            ..
        }
    ));
    assert_eq!(mock.call_count(MockOperation::ListContactMethods), 1);
    assert_eq!(mock.call_count(MockOperation::AddContactMethod), 1);
    assert_eq!(mock.call_count(MockOperation::AddNotificationRule), 2);
}

#[tokio::test]
async fn test_failing_team_lookup_only_fails_its_record() {
    let mock = Arc::new(MockDirectoryClient::new().with_team("Ops").with_team("Infra"));
    mock.fail_when(
        MockOperation::FindTeamsByName,
        "Infra",
        MockFailure::Transport("connection reset by peer".to_string()),
    );
    let mut engine = engine(&mock);

    let rows = vec![
        Ok(fixtures::user_on_team("one@example.com", "Ops")),
        Ok(fixtures::user_on_team("two@example.com", "Infra")),
        Ok(fixtures::user_on_team("three@example.com", "Ops")),
    ];
    let report = engine.run(rows).await.unwrap();

    let statuses: Vec<RecordStatus> = report.outcomes.iter().map(|o| o.status()).collect();
    assert_eq!(
        statuses,
        vec![
            RecordStatus::Succeeded,
            RecordStatus::Failed,
            RecordStatus::Succeeded,
        ]
    );

    let failure = report.outcomes[1].failure.as_ref().unwrap();
    assert_eq!(failure.step, Step::FindTeam);
    assert_eq!(failure.error.kind(), ErrorKind::Transport);
    assert_eq!(failure.error.scope(), ErrorScope::Record);
    assert_eq!(report.outcomes[1].record.email, "two@example.com");
    // work done before the failure is kept
    assert!(report.outcomes[1].user.as_ref().unwrap().created);

    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.failed, 1);
    assert!(report.aborted.is_none());
}

#[tokio::test]
async fn test_membership_failure_keeps_earlier_teams() {
    let mock = Arc::new(MockDirectoryClient::new().with_team("A").with_team("B"));
    let team_b = mock.teams()[1].id.clone();
    mock.fail_when(
        MockOperation::AddUserToTeam,
        &team_b,
        MockFailure::Api(500, "Internal Server Error".to_string()),
    );
    let mut engine = engine(&mock);

    let outcome = engine
        .process(
            ImportRecordBuilder::new("ada@example.com")
                .with_teams(&["A", "B"])
                .with_phone("1", "5550100")
                .build(),
        )
        .await;

    assert_eq!(outcome.status(), RecordStatus::Failed);
    assert_eq!(outcome.failure.as_ref().unwrap().step, Step::AddMembership);
    assert_eq!(outcome.memberships_added(), 1);
    assert_eq!(mock.call_count(MockOperation::AddContactMethod), 0);
}

#[tokio::test]
async fn test_pre_run_decline_makes_no_calls() {
    let mock = Arc::new(MockDirectoryClient::new());
    let gate = ScriptedGate::new(&[false]);
    let config = EngineConfig {
        confirm_before_run: true,
        ..EngineConfig::default()
    };
    let mut engine = engine_with(&mock, gate.clone(), config);

    let result = engine
        .run(vec![Ok(fixtures::user_on_team("ada@example.com", "Ops"))])
        .await;

    match result {
        Err(Error::PolicyDeclined { stage, .. }) => assert_eq!(stage, DeclineStage::BeforeRun),
        other => panic!("expected a declined run, got {other:?}"),
    }
    assert!(mock.calls().is_empty());
    assert_eq!(gate.prompts().len(), 1);
    assert!(gate.prompts()[0].contains("acme"));
}

#[tokio::test]
async fn test_shifted_title_decline_fails_only_that_record() {
    let mock = Arc::new(MockDirectoryClient::new());
    let gate = ScriptedGate::new(&[false]);
    let mut engine = engine_with(&mock, gate.clone(), EngineConfig::default());

    let shifted = ImportRecordBuilder::new("shifted@example.com")
        .with_title("Engineer")
        .with_phone("Platform", "1")
        .build();
    let report = engine
        .run(vec![
            Ok(shifted),
            Ok(ImportRecordBuilder::new("fine@example.com").build()),
        ])
        .await
        .unwrap();

    let failure = report.outcomes[0].failure.as_ref().unwrap();
    assert_eq!(failure.step, Step::CreateUser);
    assert!(matches!(
        failure.error,
        Error::PolicyDeclined {
            stage: DeclineStage::DuringRecord,
            ..
        }
    ));
    assert_eq!(failure.error.scope(), ErrorScope::Record);
    assert_eq!(report.outcomes[1].status(), RecordStatus::Succeeded);
    assert_eq!(mock.call_count(MockOperation::CreateUser), 1);
    assert_eq!(gate.prompts().len(), 1);
}

#[tokio::test]
async fn test_shifted_title_accepted_creates_user() {
    let mock = Arc::new(MockDirectoryClient::new());
    let gate = ScriptedGate::new(&[true]);
    let mut engine = engine_with(&mock, gate, EngineConfig::default());

    let outcome = engine
        .process(
            ImportRecordBuilder::new("shifted@example.com")
                .with_phone("1", "Platform")
                .build(),
        )
        .await;

    assert!(outcome.failure.is_none());
    assert_eq!(outcome.status(), RecordStatus::Succeeded);
    assert_eq!(mock.call_count(MockOperation::CreateUser), 1);
}

#[tokio::test]
async fn test_new_user_without_name_fails_validation() {
    let mock = Arc::new(MockDirectoryClient::new());
    let mut engine = engine(&mock);

    let outcome = engine
        .process(ImportRecordBuilder::new("anon@example.com").without_name().build())
        .await;

    assert_eq!(outcome.failure_kind(), Some(ErrorKind::Validation));
    assert_eq!(outcome.failure.as_ref().unwrap().step, Step::CreateUser);
    assert_eq!(mock.call_count(MockOperation::CreateUser), 0);
}

#[tokio::test]
async fn test_unknown_team_role_fails_record() {
    let mock = Arc::new(MockDirectoryClient::new().with_team("Ops"));
    let mut engine = engine(&mock);

    let outcome = engine
        .process(
            ImportRecordBuilder::new("ada@example.com")
                .with_teams(&["Ops"])
                .with_team_roles(&["boss"])
                .build(),
        )
        .await;

    assert_eq!(outcome.failure.as_ref().unwrap().step, Step::ResolveRole);
    assert_eq!(outcome.failure_kind(), Some(ErrorKind::Validation));
    assert_eq!(mock.call_count(MockOperation::AddUserToTeam), 0);
}

#[tokio::test]
async fn test_ambiguous_email_uses_first_match() {
    let mock = Arc::new(
        MockDirectoryClient::new()
            .with_user("First", "dup@example.com", "user")
            .with_user("Second", "dup@example.com", "user"),
    );
    let first_id = mock.users()[0].id.clone();
    let mut engine = engine(&mock);

    let outcome = engine
        .process(ImportRecordBuilder::new("dup@example.com").build())
        .await;

    let user = outcome.user.unwrap();
    assert_eq!(user.user_id, first_id);
    assert_eq!(user.matches, 2);
    assert_eq!(mock.call_count(MockOperation::CreateUser), 0);
}

#[tokio::test]
async fn test_run_reports_rejected_rows_and_continues() {
    let mock = Arc::new(MockDirectoryClient::new().with_team("Ops"));
    let observer = Arc::new(RecordingObserver::new());
    let mut engine = engine(&mock).with_observer(observer.clone());

    let input = "Ada,ada@example.com,,,,,Ops\nNobody,,user\nGrace,grace@example.com,,,,,Ops\n";
    let rows = RecordReader::from_reader(input.as_bytes(), ReaderMode::Positional)
        .unwrap()
        .records();
    let report = engine.run(rows).await.unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].line, Some(2));
    assert_eq!(report.summary.rejected, 1);
    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.total(), 3);
    assert_eq!(
        observer.lines(),
        vec![
            "started 1 ada@example.com",
            "finished ada@example.com Succeeded",
            "rejected line 2",
            "started 3 grace@example.com",
            "finished grace@example.com Succeeded",
        ]
    );
}

#[tokio::test]
async fn test_created_team_is_reported_when_membership_fails() {
    let mock = Arc::new(MockDirectoryClient::new());
    mock.fail_always(
        MockOperation::AddUserToTeam,
        MockFailure::Api(500, "Internal Server Error".to_string()),
    );
    let mut engine = engine(&mock);

    let outcome = engine
        .process(
            ImportRecordBuilder::new("ada@example.com")
                .with_teams(&["NewTeam"])
                .build(),
        )
        .await;

    assert_eq!(outcome.status(), RecordStatus::Failed);
    assert_eq!(outcome.failure.as_ref().unwrap().step, Step::AddMembership);
    assert_eq!(mock.call_count(MockOperation::CreateTeam), 1);
    let team_id = mock.teams()[0].id.clone();
    assert_eq!(
        outcome.teams,
        vec![TeamOutcome::CreatedNotJoined {
            index: 0,
            team_name: "NewTeam".to_string(),
            team_id,
        }]
    );
    assert_eq!(outcome.teams_created(), 1);
    assert_eq!(outcome.memberships_added(), 0);

    let report = pdprov_core::BatchReport::new(vec![outcome], Vec::new(), None);
    assert_eq!(report.summary.teams_created, 1);
    assert_eq!(report.summary.memberships_added, 0);
}

#[tokio::test]
async fn test_membership_failure_on_existing_team_reports_no_created_team() {
    let mock = Arc::new(MockDirectoryClient::new().with_team("Ops"));
    mock.fail_always(MockOperation::AddUserToTeam, MockFailure::Timeout);
    let mut engine = engine(&mock);

    let outcome = engine
        .process(fixtures::user_on_team("ada@example.com", "Ops"))
        .await;

    assert_eq!(outcome.status(), RecordStatus::Failed);
    assert!(outcome.teams.is_empty());
    assert_eq!(outcome.teams_created(), 0);
}

#[tokio::test]
async fn test_fatal_row_stops_the_run() {
    let mock = Arc::new(MockDirectoryClient::new().with_team("Ops"));
    let mut engine = engine(&mock);

    let broken = std::io::Error::new(std::io::ErrorKind::InvalidData, "stream closed");
    let rows = vec![
        Ok(fixtures::user_on_team("one@example.com", "Ops")),
        Err(RowRejected::new(Some(2), Vec::new(), IoError::from_std(broken))),
        Ok(fixtures::user_on_team("three@example.com", "Ops")),
    ];
    let report = engine.run(rows).await.unwrap();

    let aborted = report.aborted.as_ref().unwrap();
    assert_eq!(aborted.kind(), ErrorKind::Io);
    assert_eq!(aborted.scope(), ErrorScope::Run);
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].record.email, "one@example.com");
    assert!(report.rejected.is_empty());
    assert!(mock.user_by_email("three@example.com").is_none());
    assert_eq!(mock.call_count(MockOperation::CreateUser), 1);
}

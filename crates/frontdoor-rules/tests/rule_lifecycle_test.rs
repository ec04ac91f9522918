use frontdoor_rules::ids::RULE;
use frontdoor_rules::lifecycle::{PlaneConfig, RuleSystem, SystemConfig};
use frontdoor_rules::model::conditions::{ConditionParameters, Operator};
use frontdoor_rules::model::{DeliveryRuleCondition, MatchBehavior, RulePatch};
use frontdoor_rules::rule_resource::Rule;
use reconcile_framework::mock::{ApiCall, MockApi};
use reconcile_framework::{
    ApiError, Fragment, LifecycleController, ManagedResource, ManagementApi, OperationStatus,
    Phase, ReadOutcome, ReconcileError, ReconcilerConfig, ResourceIdentity, ResourceInstance,
    Submitted, Timeouts,
};
use serde_json::{json, Value};
use std::time::Duration;

// --- Helpers ---

const RULE_SET_ID: &str =
    "/subscriptions/S/resourceGroups/G/providers/Microsoft.Cdn/profiles/P/ruleSets/RS";

fn desired(value: Value) -> Fragment {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn rule(name: &str, behavior: &str) -> Fragment {
    desired(json!({
        "name": name,
        "cdn_frontdoor_rule_set_id": RULE_SET_ID,
        "order": 2,
        "behavior_on_match": behavior,
        "conditions": {
            "request_scheme_condition": [{ "operator": "Equal", "match_values": ["HTTP"] }]
        },
        "actions": {
            "url_redirect_action": [{
                "redirect_type": "Moved",
                "redirect_protocol": "Https",
                "destination_hostname": "contoso.com"
            }]
        }
    }))
}

fn id(name: &str) -> ResourceIdentity {
    RULE.parse(&format!("{RULE_SET_ID}/rules/{name}")).unwrap()
}

fn config() -> SystemConfig {
    SystemConfig {
        reconciler: ReconcilerConfig {
            create_timeout_secs: 10,
            read_timeout_secs: 5,
            update_timeout_secs: 10,
            delete_timeout_secs: 10,
            poll_interval_ms: 10,
        },
        plane: PlaneConfig {
            buffer_size: 16,
            polls_to_complete: 2,
            fail_operations: false,
            operation_ttl_secs: 60,
        },
    }
}

fn fast() -> Timeouts {
    config().timeouts()
}

async fn settle<A: ManagementApi<Rule>>(api: &A, submitted: Submitted) {
    if let Submitted::Accepted(op) = submitted {
        while api.poll(&op).await.unwrap() == OperationStatus::InProgress {}
    }
}

// --- Tests ---

#[tokio::test]
async fn test_rule_lifecycle_against_plane() {
    let system = RuleSystem::new(&config());
    let mut instance = ResourceInstance::absent();

    // 1. Create
    let state = system
        .rules
        .create(&mut instance, &rule("Redirect", "Continue"))
        .await
        .unwrap();
    assert_eq!(instance.phase(), Phase::Present);
    assert_eq!(instance.identity(), Some(&id("Redirect")));
    assert_eq!(state["cdn_frontdoor_rule_set_name"], json!("RS"));
    assert_eq!(state["order"], json!(2));
    assert_eq!(
        state["actions"]["url_redirect_action"],
        json!([{
            "redirect_type": "Moved",
            "redirect_protocol": "Https",
            "destination_path": "",
            "destination_hostname": "contoso.com",
            "query_string": "",
            "destination_fragment": ""
        }])
    );

    // 2. Read
    let outcome = system.rules.read(&mut instance).await.unwrap();
    assert_eq!(outcome, ReadOutcome::Present(state.clone()));

    // 3. Update: only the match behavior changes
    let updated = system
        .rules
        .update(&mut instance, &rule("Redirect", "Stop"))
        .await
        .unwrap();
    assert_eq!(updated["behavior_on_match"], json!("Stop"));
    assert_eq!(updated["order"], state["order"]);
    assert_eq!(updated["conditions"], state["conditions"]);

    // 4. Delete
    system.rules.delete(&mut instance).await.unwrap();
    assert_eq!(instance, ResourceInstance::absent());
    assert_eq!(system.rules.api().get(&id("Redirect")).await.unwrap(), None);

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_second_create_requires_import() {
    let system = RuleSystem::new(&config());

    let mut first = ResourceInstance::absent();
    system
        .rules
        .create(&mut first, &rule("Redirect", "Continue"))
        .await
        .unwrap();

    let mut second = ResourceInstance::absent();
    let err = system
        .rules
        .create(&mut second, &rule("Redirect", "Stop"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::AlreadyExists { ref identity } if identity == &id("Redirect").render()));
    assert_eq!(second.phase(), Phase::Absent);

    // The import path picks the existing rule up.
    let imported = system.rules.import(&id("Redirect").render()).await.unwrap();
    assert_eq!(imported.state(), first.state());

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_read_after_out_of_band_delete_drops_the_rule() {
    let system = RuleSystem::new(&config());
    let mut instance = ResourceInstance::absent();
    system
        .rules
        .create(&mut instance, &rule("Redirect", "Continue"))
        .await
        .unwrap();

    let api = system.rules.api();
    settle(api, api.delete(&id("Redirect")).await.unwrap()).await;

    assert_eq!(system.rules.read(&mut instance).await.unwrap(), ReadOutcome::Gone);
    assert_eq!(instance.phase(), Phase::Absent);
    assert_eq!(instance.identity(), None);

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_update_with_twelve_conditions_fails_before_any_remote_call() {
    let mock = MockApi::<Rule>::new();
    let controller = LifecycleController::new(mock.clone(), fast());
    let mut instance = ResourceInstance::tracking(id("Redirect"));

    let paths: Vec<_> = (0..12)
        .map(|i| json!({ "operator": "BeginsWith", "match_values": [format!("/p{i}")] }))
        .collect();
    let mut desired = rule("Redirect", "Continue");
    desired.insert("conditions".into(), json!({ "url_path_condition": paths }));

    let err = controller.update(&mut instance, &desired).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::CeilingExceeded { field: "conditions", ceiling: 10, count: 12, .. }
    ));
    assert!(err.is_local());
    assert!(mock.calls().is_empty());
    assert_eq!(instance.phase(), Phase::Present);
}

#[tokio::test]
async fn test_incompatible_actions_fail_before_any_remote_call() {
    let mock = MockApi::<Rule>::new();
    let controller = LifecycleController::new(mock.clone(), fast());

    let mut desired = rule("Redirect", "Continue");
    desired.insert(
        "actions".into(),
        json!({
            "url_redirect_action": [{ "redirect_type": "Found", "destination_hostname": "contoso.com" }],
            "url_rewrite_action": [{ "source_pattern": "/", "destination": "/index.html" }]
        }),
    );

    let err = controller
        .create(&mut ResourceInstance::absent(), &desired)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::IncompatibleCombination { ref field, .. } if field == "actions"
    ));
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_update_patches_behavior_without_touching_order() {
    let mut mock = MockApi::<Rule>::new();
    let before = Rule::expand(&id("Redirect"), &rule("Redirect", "Continue")).unwrap();
    let after = Rule::expand(&id("Redirect"), &rule("Redirect", "Stop")).unwrap();
    mock.expect_get(&id("Redirect")).return_ok(Some(before));
    mock.expect_update(&id("Redirect")).return_accepted("op-1");
    mock.expect_poll("op-1").return_ok(OperationStatus::Succeeded);
    mock.expect_get(&id("Redirect")).return_ok(Some(after));

    let controller = LifecycleController::new(mock.clone(), fast());
    let mut instance = controller.import(&id("Redirect").render()).await.unwrap();
    let state = controller
        .update(&mut instance, &rule("Redirect", "Stop"))
        .await
        .unwrap();
    assert_eq!(state["behavior_on_match"], json!("Stop"));

    let patches: Vec<_> = mock
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ApiCall::Update(_, patch) => Some(patch),
            _ => None,
        })
        .collect();
    assert_eq!(
        patches,
        vec![RulePatch {
            match_processing_behavior: Some(MatchBehavior::Stop),
            ..RulePatch::default()
        }]
    );
    mock.verify();
}

#[tokio::test]
async fn test_delete_treats_missing_rule_as_deleted() {
    let mut mock = MockApi::<Rule>::new();
    mock.expect_delete(&id("Redirect")).return_err(ApiError::NotFound);

    let controller = LifecycleController::new(mock.clone(), fast());
    let mut instance = ResourceInstance::tracking(id("Redirect"));
    controller.delete(&mut instance).await.unwrap();
    assert_eq!(instance.phase(), Phase::Absent);

    controller.delete(&mut ResourceInstance::absent()).await.unwrap();
    assert_eq!(mock.calls().len(), 1);
    mock.verify();
}

#[tokio::test]
async fn test_failed_plane_operation_is_a_remote_failure() {
    let mut config = config();
    config.plane.fail_operations = true;
    let system = RuleSystem::new(&config);

    let mut instance = ResourceInstance::absent();
    let err = system
        .rules
        .create(&mut instance, &rule("Redirect", "Continue"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::RemoteFailure { .. }));
    assert!(err.to_string().contains("Redirect"));
    assert_eq!(instance.phase(), Phase::Absent);

    system.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slow_plane_times_out() {
    let mut config = config();
    config.plane.polls_to_complete = u32::MAX;
    config.reconciler.create_timeout_secs = 1;
    let system = RuleSystem::new(&config);

    let mut instance = ResourceInstance::absent();
    let err = system
        .rules
        .create(&mut instance, &rule("Redirect", "Continue"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::OperationTimeout { budget, .. } if budget == Duration::from_secs(1)
    ));
    assert_eq!(instance.phase(), Phase::Absent);

    // The stranded insert neither blocks a retry nor hides the rule forever
    let err = system
        .rules
        .create(&mut instance, &rule("Redirect", "Stop"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::OperationTimeout { .. }));

    tokio::time::sleep(Duration::from_secs(120)).await;
    let imported = system.rules.import(&id("Redirect").render()).await.unwrap();
    assert_eq!(imported.state().unwrap()["behavior_on_match"], json!("Stop"));

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cancelled_update_leaves_the_rule_readable() {
    let system = RuleSystem::new(&config());
    let mut instance = ResourceInstance::absent();
    system
        .rules
        .create(&mut instance, &rule("Redirect", "Continue"))
        .await
        .unwrap();

    let cancelled = tokio::time::timeout(
        Duration::from_millis(5),
        system.rules.update(&mut instance, &rule("Redirect", "Stop")),
    )
    .await;
    assert!(cancelled.is_err());
    assert_eq!(instance.phase(), Phase::Updating);
    assert_eq!(instance.identity(), Some(&id("Redirect")));

    // Reading settles the instance again
    let ReadOutcome::Present(state) = system.rules.read(&mut instance).await.unwrap() else {
        panic!("the rule should still exist");
    };
    assert_eq!(instance.phase(), Phase::Present);
    assert_eq!(state["order"], json!(2));

    let updated = system
        .rules
        .update(&mut instance, &rule("Redirect", "Stop"))
        .await
        .unwrap();
    assert_eq!(updated["behavior_on_match"], json!("Stop"));

    system.rules.delete(&mut instance).await.unwrap();
    assert_eq!(instance, ResourceInstance::absent());

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cancelled_delete_can_be_retried() {
    let system = RuleSystem::new(&config());
    let mut instance = ResourceInstance::absent();
    system
        .rules
        .create(&mut instance, &rule("Redirect", "Continue"))
        .await
        .unwrap();

    let cancelled =
        tokio::time::timeout(Duration::from_millis(5), system.rules.delete(&mut instance)).await;
    assert!(cancelled.is_err());
    assert_eq!(instance.phase(), Phase::Deleting);

    system.rules.delete(&mut instance).await.unwrap();
    assert_eq!(instance, ResourceInstance::absent());
    assert_eq!(system.rules.api().get(&id("Redirect")).await.unwrap(), None);

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_update_corrects_remote_values_local_checks_refuse() {
    let system = RuleSystem::new(&config());
    let api = system.rules.api();

    // Port 8080 is valid on the wire but outside the ports a desired state may name
    let mut record = Rule::expand(&id("Redirect"), &rule("Redirect", "Continue")).unwrap();
    record.conditions = vec![DeliveryRuleCondition::ServerPort(ConditionParameters {
        operator: Operator::Equal,
        negate_condition: false,
        match_values: vec!["8080".to_string()],
        transforms: vec![],
        selector: None,
    })];
    settle(api, api.create(&id("Redirect"), record).await.unwrap()).await;

    let mut instance = system.rules.import(&id("Redirect").render()).await.unwrap();
    assert_eq!(
        instance.state().unwrap()["conditions"]["server_port_condition"][0]["match_values"],
        json!(["8080"])
    );

    let mut desired = rule("Redirect", "Continue");
    desired.remove("conditions");
    let state = system.rules.update(&mut instance, &desired).await.unwrap();
    assert_eq!(state["conditions"]["server_port_condition"], json!([]));
    assert_eq!(state["conditions"]["request_scheme_condition"], json!([]));
    assert!(api.get(&id("Redirect")).await.unwrap().unwrap().conditions.is_empty());

    system.shutdown().await.unwrap();
}

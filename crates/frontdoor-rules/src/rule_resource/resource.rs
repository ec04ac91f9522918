//! [`ManagedResource`] implementation for [`Rule`].

use crate::ids::{RULE, RULE_SET};
use crate::model::{
    action_registry, condition_registry, identity_field, reject_unknown_fields, MatchBehavior,
    RulePatch, RuleRecord,
};
use reconcile_framework::codec;
use reconcile_framework::error::AtIdentity;
use reconcile_framework::fragment::decode_block;
use reconcile_framework::{
    ChangeSet, CodecError, Fragment, IdentityTemplate, ManagedResource, PlaneResource,
    ReconcileError, ResourceIdentity,
};
use serde_json::Value;

const NAME: &str = "name";
const RULE_SET_ID: &str = "cdn_frontdoor_rule_set_id";
const RULE_SET_NAME: &str = "cdn_frontdoor_rule_set_name";
const BEHAVIOR_ON_MATCH: &str = "behavior_on_match";
const ORDER: &str = "order";
const ACTIONS: &str = "actions";
const CONDITIONS: &str = "conditions";

const DECLARED: &[&str] = &[
    NAME,
    RULE_SET_ID,
    RULE_SET_NAME,
    BEHAVIOR_ON_MATCH,
    ORDER,
    ACTIONS,
    CONDITIONS,
];

const MAX_NAME_LEN: usize = 260;

/// Marker type for the delivery rule resource kind.
#[derive(Debug, Clone, Copy)]
pub struct Rule;

impl ManagedResource for Rule {
    type Record = RuleRecord;
    type Patch = RulePatch;
    const KIND: &'static str = "cdn_frontdoor_rule";

    fn template() -> &'static IdentityTemplate {
        &RULE
    }

    fn identity(desired: &Fragment) -> Result<ResourceIdentity, ReconcileError> {
        let rule_set_id = identity_field(desired, RULE_SET_ID, &RULE_SET)?;
        let name = identity_field(desired, NAME, &RULE)?;
        validate_name(name)?;
        let rule_set = RULE_SET.parse(rule_set_id)?;
        RULE.derive_child(&rule_set, name)
    }

    fn expand(identity: &ResourceIdentity, desired: &Fragment) -> Result<RuleRecord, ReconcileError> {
        reject_unknown_fields(desired, DECLARED).at(identity)?;

        let order = expand_order(desired.get(ORDER)).at(identity)?;
        let match_processing_behavior = match desired.get(BEHAVIOR_ON_MATCH) {
            None | Some(Value::Null) => MatchBehavior::default(),
            Some(value) => decode_block(BEHAVIOR_ON_MATCH, value).at(identity)?,
        };

        let actions = codec::expand(desired.get(ACTIONS), action_registry()?).at(identity)?;
        if actions.is_empty() {
            return Err(ReconcileError::InvalidField {
                identity: identity.clone(),
                field: ACTIONS.to_string(),
                reason: "at least one action is required".to_string(),
            });
        }
        let conditions = codec::expand(desired.get(CONDITIONS), condition_registry()?).at(identity)?;

        Ok(RuleRecord {
            rule_set_name: identity.value("ruleSets").unwrap_or_default().to_string(),
            order,
            match_processing_behavior,
            actions,
            conditions,
        })
    }

    fn flatten(identity: &ResourceIdentity, record: &RuleRecord) -> Result<Fragment, ReconcileError> {
        let rule_set = identity.parent(&RULE_SET)?;
        let actions = codec::flatten(&record.actions, action_registry()?).at(identity)?;
        let conditions = codec::flatten(&record.conditions, condition_registry()?).at(identity)?;

        let mut state = Fragment::new();
        state.insert(NAME.into(), Value::from(identity.leaf_name()));
        state.insert(RULE_SET_ID.into(), Value::from(rule_set.render()));
        state.insert(RULE_SET_NAME.into(), Value::from(record.rule_set_name.as_str()));
        state.insert(
            BEHAVIOR_ON_MATCH.into(),
            Value::from(match record.match_processing_behavior {
                MatchBehavior::Continue => "Continue",
                MatchBehavior::Stop => "Stop",
            }),
        );
        state.insert(ORDER.into(), Value::from(record.order));
        state.insert(ACTIONS.into(), actions);
        state.insert(CONDITIONS.into(), conditions);
        Ok(state)
    }

    fn expand_patch(
        identity: &ResourceIdentity,
        desired: &Fragment,
        changes: &ChangeSet,
    ) -> Result<Option<RulePatch>, ReconcileError> {
        let record = Self::expand(identity, desired)?;
        let patch = RulePatch {
            order: changes.contains(ORDER).then_some(record.order),
            match_processing_behavior: changes
                .contains(BEHAVIOR_ON_MATCH)
                .then_some(record.match_processing_behavior),
            actions: changes.contains(ACTIONS).then_some(record.actions),
            conditions: changes.contains(CONDITIONS).then_some(record.conditions),
        };
        Ok((!patch.is_empty()).then_some(patch))
    }
}

impl PlaneResource for Rule {
    fn apply_patch(record: &mut RuleRecord, patch: RulePatch) {
        patch.apply_to(record);
    }
}

/// Letters and digits, starting with a letter.
fn validate_name(name: &str) -> Result<(), ReconcileError> {
    let reason = if name.is_empty() {
        Some("may not be empty".to_string())
    } else if name.len() > MAX_NAME_LEN {
        Some(format!("may be at most {MAX_NAME_LEN} characters"))
    } else if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        Some("must start with a letter".to_string())
    } else if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some("may only contain letters and numbers".to_string())
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ReconcileError::MalformedIdentity {
            expected: RULE.name(),
            input: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn expand_order(value: Option<&Value>) -> Result<u32, CodecError> {
    match value {
        None | Some(Value::Null) => Err(CodecError::invalid(ORDER, "is required")),
        Some(value) => value
            .as_u64()
            .and_then(|order| u32::try_from(order).ok())
            .ok_or_else(|| CodecError::invalid(ORDER, format!("expected a non-negative integer, got {value}"))),
    }
}

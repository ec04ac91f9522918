use super::{DeliveryRuleAction, DeliveryRuleCondition};
use serde::{Deserialize, Serialize};

/// Whether the rules engine evaluates the remaining rules of the set after a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchBehavior {
    #[default]
    Continue,
    Stop,
}

/// A delivery rule as the management plane stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    /// Computed by the plane from the rule's parent.
    pub rule_set_name: String,
    pub order: u32,
    pub match_processing_behavior: MatchBehavior,
    pub actions: Vec<DeliveryRuleAction>,
    #[serde(default)]
    pub conditions: Vec<DeliveryRuleCondition>,
}

/// Partial update of a rule. `None` leaves a field as stored; `Some(vec![])` clears the
/// conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_processing_behavior: Option<MatchBehavior>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<DeliveryRuleAction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<DeliveryRuleCondition>>,
}

impl RulePatch {
    pub fn is_empty(&self) -> bool {
        self.order.is_none()
            && self.match_processing_behavior.is_none()
            && self.actions.is_none()
            && self.conditions.is_none()
    }

    /// Applies the patch to a stored record.
    pub fn apply_to(self, record: &mut RuleRecord) {
        if let Some(order) = self.order {
            record.order = order;
        }
        if let Some(behavior) = self.match_processing_behavior {
            record.match_processing_behavior = behavior;
        }
        if let Some(actions) = self.actions {
            record.actions = actions;
        }
        if let Some(conditions) = self.conditions {
            record.conditions = conditions;
        }
    }
}

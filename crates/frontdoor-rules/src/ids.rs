//! Identity templates for the Front Door resources managed by this crate.
//!
//! ```text
//! /subscriptions/S/resourceGroups/G
//!   /providers/Microsoft.Cdn/profiles/P
//!     /ruleSets/RS
//!       /rules/R1
//!     /originGroups/OG
//! /subscriptions/S/resourceGroups/G/providers/Microsoft.Resources/tags/default
//! ```

use reconcile_framework::{IdentityTemplate, SegmentSpec};

pub static RESOURCE_GROUP: IdentityTemplate = IdentityTemplate::new(
    "resource group",
    &[
        SegmentSpec::Named("subscriptions"),
        SegmentSpec::Named("resourceGroups"),
    ],
);

pub static PROFILE: IdentityTemplate = IdentityTemplate::new(
    "Front Door profile",
    &[
        SegmentSpec::Named("subscriptions"),
        SegmentSpec::Named("resourceGroups"),
        SegmentSpec::Fixed("providers", "Microsoft.Cdn"),
        SegmentSpec::Named("profiles"),
    ],
);

pub static RULE_SET: IdentityTemplate = IdentityTemplate::new(
    "Front Door rule set",
    &[
        SegmentSpec::Named("subscriptions"),
        SegmentSpec::Named("resourceGroups"),
        SegmentSpec::Fixed("providers", "Microsoft.Cdn"),
        SegmentSpec::Named("profiles"),
        SegmentSpec::Named("ruleSets"),
    ],
);

pub static RULE: IdentityTemplate = IdentityTemplate::new(
    "Front Door rule",
    &[
        SegmentSpec::Named("subscriptions"),
        SegmentSpec::Named("resourceGroups"),
        SegmentSpec::Fixed("providers", "Microsoft.Cdn"),
        SegmentSpec::Named("profiles"),
        SegmentSpec::Named("ruleSets"),
        SegmentSpec::Named("rules"),
    ],
);

pub static ORIGIN_GROUP: IdentityTemplate = IdentityTemplate::new(
    "Front Door origin group",
    &[
        SegmentSpec::Named("subscriptions"),
        SegmentSpec::Named("resourceGroups"),
        SegmentSpec::Fixed("providers", "Microsoft.Cdn"),
        SegmentSpec::Named("profiles"),
        SegmentSpec::Named("originGroups"),
    ],
);

/// The tags of a resource group. Exactly one exists per group, hence the fixed leaf.
pub static TAGS: IdentityTemplate = IdentityTemplate::new(
    "resource tags",
    &[
        SegmentSpec::Named("subscriptions"),
        SegmentSpec::Named("resourceGroups"),
        SegmentSpec::Fixed("providers", "Microsoft.Resources"),
        SegmentSpec::Fixed("tags", "default"),
    ],
);

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile_framework::ReconcileError;

    const RULE_SET_ID: &str =
        "/subscriptions/S/resourceGroups/G/providers/Microsoft.Cdn/profiles/P/ruleSets/RS";
    const RULE_ID: &str =
        "/subscriptions/S/resourceGroups/G/providers/Microsoft.Cdn/profiles/P/ruleSets/RS/rules/R1";

    #[test]
    fn test_rule_identity_round_trip() {
        let rule = RULE.parse(RULE_ID).unwrap();
        assert_eq!(rule.render(), RULE_ID);
        assert_eq!(RULE.parse(&rule.render()).unwrap(), rule);
        assert_eq!(rule.value("ruleSets"), Some("RS"));
        assert_eq!(rule.leaf_name(), "R1");
    }

    #[test]
    fn test_rule_is_derived_from_its_rule_set() {
        let rule_set = RULE_SET.parse(RULE_SET_ID).unwrap();
        let rule = RULE.derive_child(&rule_set, "R1").unwrap();
        assert_eq!(rule.render(), RULE_ID);
        assert_eq!(rule.parent(&RULE_SET).unwrap(), rule_set);
        assert_eq!(
            rule.parent(&PROFILE).unwrap().render(),
            "/subscriptions/S/resourceGroups/G/providers/Microsoft.Cdn/profiles/P"
        );
        assert!(rule.parent(&ORIGIN_GROUP).is_err());
    }

    #[test]
    fn test_rule_set_id_is_not_a_rule_id() {
        assert!(matches!(
            RULE.parse(RULE_SET_ID),
            Err(ReconcileError::MalformedIdentity { expected: "Front Door rule", .. })
        ));
        let origin_group = "/subscriptions/S/resourceGroups/G/providers/Microsoft.Cdn/profiles/P/originGroups/OG";
        assert!(RULE_SET.parse(origin_group).is_err());
        assert!(ORIGIN_GROUP.parse(origin_group).is_ok());
    }

    #[test]
    fn test_tags_identity_hangs_off_the_resource_group() {
        let group = RESOURCE_GROUP.parse("/subscriptions/S/resourceGroups/G").unwrap();
        let tags = TAGS.child_of(&group, Vec::<String>::new()).unwrap();
        assert_eq!(
            tags.render(),
            "/subscriptions/S/resourceGroups/G/providers/Microsoft.Resources/tags/default"
        );
        assert_eq!(tags.parent(&RESOURCE_GROUP).unwrap(), group);
        assert!(TAGS
            .parse("/subscriptions/S/resourceGroups/G/providers/Microsoft.Resources/tags/other")
            .is_err());
    }
}

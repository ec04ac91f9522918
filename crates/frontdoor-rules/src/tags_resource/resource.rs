use crate::ids::{RESOURCE_GROUP, TAGS};
use crate::model::tags::{MAX_TAGS, MAX_TAG_KEY_LEN, MAX_TAG_VALUE_LEN};
use crate::model::{identity_field, reject_unknown_fields, TagsRecord};
use reconcile_framework::error::AtIdentity;
use reconcile_framework::fragment::{decode_block, encode_block};
use reconcile_framework::{
    ChangeSet, CodecError, Fragment, IdentityTemplate, ManagedResource, PlaneResource,
    ReconcileError, ResourceIdentity,
};
use serde_json::Value;
use std::collections::BTreeMap;

const RESOURCE_ID: &str = "resource_id";
const TAGS_FIELD: &str = "tags";

/// Marker type for the resource tags kind.
#[derive(Debug, Clone, Copy)]
pub struct Tags;

impl ManagedResource for Tags {
    type Record = TagsRecord;
    type Patch = TagsRecord;
    const KIND: &'static str = "resource_group_tags";

    fn template() -> &'static IdentityTemplate {
        &TAGS
    }

    fn identity(desired: &Fragment) -> Result<ResourceIdentity, ReconcileError> {
        let scope = identity_field(desired, RESOURCE_ID, &RESOURCE_GROUP)?;
        let group = RESOURCE_GROUP.parse(scope)?;
        TAGS.child_of(&group, Vec::<String>::new())
    }

    fn expand(identity: &ResourceIdentity, desired: &Fragment) -> Result<TagsRecord, ReconcileError> {
        reject_unknown_fields(desired, &[RESOURCE_ID, TAGS_FIELD]).at(identity)?;
        let tags: BTreeMap<String, String> = match desired.get(TAGS_FIELD) {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(value) => decode_block(TAGS_FIELD, value).at(identity)?,
        };
        validate_tags(&tags).at(identity)?;
        Ok(TagsRecord { tags })
    }

    fn flatten(identity: &ResourceIdentity, record: &TagsRecord) -> Result<Fragment, ReconcileError> {
        let group = identity.parent(&RESOURCE_GROUP)?;
        let mut state = Fragment::new();
        state.insert(RESOURCE_ID.into(), Value::from(group.render()));
        state.insert(TAGS_FIELD.into(), encode_block(TAGS_FIELD, &record.tags).at(identity)?);
        Ok(state)
    }

    fn expand_patch(
        identity: &ResourceIdentity,
        desired: &Fragment,
        changes: &ChangeSet,
    ) -> Result<Option<TagsRecord>, ReconcileError> {
        if !changes.contains(TAGS_FIELD) {
            return Ok(None);
        }
        Self::expand(identity, desired).map(Some)
    }
}

impl PlaneResource for Tags {
    fn apply_patch(record: &mut TagsRecord, patch: TagsRecord) {
        *record = patch;
    }
}

fn validate_tags(tags: &BTreeMap<String, String>) -> Result<(), CodecError> {
    if tags.len() > MAX_TAGS {
        return Err(CodecError::invalid(
            TAGS_FIELD,
            format!("may contain at most {MAX_TAGS} tags, got {}", tags.len()),
        ));
    }
    for (key, value) in tags {
        if key.trim().is_empty() {
            return Err(CodecError::invalid(TAGS_FIELD, "tag keys may not be empty"));
        }
        if key.chars().count() > MAX_TAG_KEY_LEN {
            return Err(CodecError::invalid(
                format!("{TAGS_FIELD}.{key}"),
                format!("tag keys may be at most {MAX_TAG_KEY_LEN} characters"),
            ));
        }
        if value.chars().count() > MAX_TAG_VALUE_LEN {
            return Err(CodecError::invalid(
                format!("{TAGS_FIELD}.{key}"),
                format!("tag values may be at most {MAX_TAG_VALUE_LEN} characters"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fragment(value: Value) -> Fragment {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_identity_hangs_off_the_resource_group() {
        let desired = fragment(json!({ "resource_id": "/subscriptions/S/resourceGroups/G" }));
        assert_eq!(
            Tags::identity(&desired).unwrap().render(),
            "/subscriptions/S/resourceGroups/G/providers/Microsoft.Resources/tags/default"
        );

        let profile = fragment(json!({
            "resource_id": "/subscriptions/S/resourceGroups/G/providers/Microsoft.Cdn/profiles/P"
        }));
        assert!(matches!(
            Tags::identity(&profile),
            Err(ReconcileError::MalformedIdentity { expected: "resource group", .. })
        ));

        let err = Tags::identity(&fragment(json!({ "tags": {} }))).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::MalformedIdentity { ref input, .. } if input == RESOURCE_ID
        ));
    }

    #[test]
    fn test_round_trip_and_patch() {
        let desired = fragment(json!({
            "resource_id": "/subscriptions/S/resourceGroups/G",
            "tags": { "env": "prod", "team": "edge" }
        }));
        let identity = Tags::identity(&desired).unwrap();
        let record = Tags::expand(&identity, &desired).unwrap();
        assert_eq!(record.tags.len(), 2);
        assert_eq!(Tags::flatten(&identity, &record).unwrap(), desired);

        let untouched: ChangeSet = ["resource_id"].into_iter().collect();
        assert_eq!(Tags::expand_patch(&identity, &desired, &untouched).unwrap(), None);
        let changed: ChangeSet = ["tags"].into_iter().collect();
        assert_eq!(
            Tags::expand_patch(&identity, &desired, &changed).unwrap(),
            Some(record)
        );
    }

    #[test]
    fn test_tag_limits() {
        let identity = TAGS.build(["S", "G"]).unwrap();
        let too_many: BTreeMap<_, _> = (0..=MAX_TAGS).map(|i| (format!("k{i}"), String::new())).collect();
        let desired = fragment(json!({ "resource_id": "/subscriptions/S/resourceGroups/G", "tags": too_many }));
        assert!(matches!(
            Tags::expand(&identity, &desired),
            Err(ReconcileError::InvalidField { ref field, .. }) if field == "tags"
        ));

        let long_value = "v".repeat(MAX_TAG_VALUE_LEN + 1);
        let desired = fragment(json!({ "resource_id": "/subscriptions/S/resourceGroups/G", "tags": { "k": long_value } }));
        assert!(matches!(
            Tags::expand(&identity, &desired),
            Err(ReconcileError::InvalidField { ref field, .. }) if field == "tags.k"
        ));

        let not_strings = fragment(json!({ "resource_id": "/subscriptions/S/resourceGroups/G", "tags": { "k": 1 } }));
        assert!(Tags::expand(&identity, &not_strings).is_err());
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_TAGS: usize = 50;
pub const MAX_TAG_KEY_LEN: usize = 512;
pub const MAX_TAG_VALUE_LEN: usize = 256;

/// The tag set of a resource group. Tags are replaced as a whole on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagsRecord {
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

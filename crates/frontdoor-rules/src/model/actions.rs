//! # Delivery Rule Actions
//!
//! What a rule does when it matches. Five kinds exist; the registry declares them in the
//! order the management plane receives them:
//!
//! | config name | discriminator | cardinality |
//! |---|---|---|
//! | `route_configuration_override_action` | `RouteConfigurationOverride` | singleton |
//! | `request_header_action` | `ModifyRequestHeader` | multi |
//! | `response_header_action` | `ModifyResponseHeader` | multi |
//! | `url_redirect_action` | `UrlRedirect` | singleton |
//! | `url_rewrite_action` | `UrlRewrite` | singleton |
//!
//! A rule carries at most [`MAX_ACTIONS`] actions, and a redirect cannot be combined with a
//! rewrite or a route override.

use super::{expand_blocks, not_empty, wrong_kind};
use crate::ids::ORIGIN_GROUP;
use reconcile_framework::fragment::encode_block;
use reconcile_framework::{
    Cardinality, CodecError, Discriminated, RawVariant, Registry, RegistryError, VariantKind,
};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::sync::OnceLock;

pub const MAX_ACTIONS: usize = 5;
const MAX_QUERY_STRING_PARAMETERS: usize = 100;

pub const ROUTE_CONFIGURATION_OVERRIDE: &str = "route_configuration_override_action";
pub const REQUEST_HEADER: &str = "request_header_action";
pub const RESPONSE_HEADER: &str = "response_header_action";
pub const URL_REDIRECT: &str = "url_redirect_action";
pub const URL_REWRITE: &str = "url_rewrite_action";

// =============================================================================
// ENUMERATIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ForwardingProtocol {
    #[default]
    MatchRequest,
    HttpOnly,
    HttpsOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QueryStringCachingBehavior {
    #[default]
    IgnoreQueryString,
    UseQueryString,
    IgnoreSpecifiedQueryStrings,
    IncludeSpecifiedQueryStrings,
}

impl QueryStringCachingBehavior {
    /// The *Specified* behaviors operate on an explicit parameter list.
    fn takes_parameters(self) -> bool {
        matches!(
            self,
            Self::IgnoreSpecifiedQueryStrings | Self::IncludeSpecifiedQueryStrings
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CacheBehavior {
    #[default]
    HonorOrigin,
    OverrideAlways,
    OverrideIfOriginMissing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderAction {
    Append,
    Overwrite,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedirectType {
    Moved,
    Found,
    TemporaryRedirect,
    PermanentRedirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RedirectProtocol {
    #[default]
    MatchRequest,
    Http,
    Https,
}

// =============================================================================
// WIRE FORMAT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfigurationOverrideParameters {
    pub origin_group_id: String,
    pub forwarding_protocol: ForwardingProtocol,
    pub query_string_caching_behavior: QueryStringCachingBehavior,
    /// Comma-separated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_parameters: Option<String>,
    pub is_compression_enabled: bool,
    pub cache_behavior: CacheBehavior,
    pub cache_duration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderActionParameters {
    pub header_action: HeaderAction,
    pub header_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRedirectParameters {
    pub redirect_type: RedirectType,
    pub destination_protocol: RedirectProtocol,
    #[serde(default)]
    pub custom_path: String,
    pub custom_hostname: String,
    #[serde(default)]
    pub custom_query_string: String,
    #[serde(default)]
    pub custom_fragment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRewriteParameters {
    pub source_pattern: String,
    pub destination: String,
    pub preserve_unmatched_path: bool,
}

/// One action as the management plane stores it.
///
/// Deserializing never fails on an unknown `name`: the variant lands in `Unrecognized` and
/// is reported when the sequence is flattened.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawVariant")]
pub enum DeliveryRuleAction {
    RouteConfigurationOverride(RouteConfigurationOverrideParameters),
    ModifyRequestHeader(HeaderActionParameters),
    ModifyResponseHeader(HeaderActionParameters),
    UrlRedirect(UrlRedirectParameters),
    UrlRewrite(UrlRewriteParameters),
    Unrecognized(RawVariant),
}

impl Discriminated for DeliveryRuleAction {
    fn discriminator(&self) -> &str {
        match self {
            Self::RouteConfigurationOverride(_) => "RouteConfigurationOverride",
            Self::ModifyRequestHeader(_) => "ModifyRequestHeader",
            Self::ModifyResponseHeader(_) => "ModifyResponseHeader",
            Self::UrlRedirect(_) => "UrlRedirect",
            Self::UrlRewrite(_) => "UrlRewrite",
            Self::Unrecognized(raw) => &raw.name,
        }
    }
}

impl TryFrom<RawVariant> for DeliveryRuleAction {
    type Error = serde_json::Error;

    fn try_from(raw: RawVariant) -> Result<Self, Self::Error> {
        let action = match raw.name.as_str() {
            "RouteConfigurationOverride" => {
                Self::RouteConfigurationOverride(serde_json::from_value(raw.parameters)?)
            }
            "ModifyRequestHeader" => Self::ModifyRequestHeader(serde_json::from_value(raw.parameters)?),
            "ModifyResponseHeader" => {
                Self::ModifyResponseHeader(serde_json::from_value(raw.parameters)?)
            }
            "UrlRedirect" => Self::UrlRedirect(serde_json::from_value(raw.parameters)?),
            "UrlRewrite" => Self::UrlRewrite(serde_json::from_value(raw.parameters)?),
            _ => Self::Unrecognized(raw),
        };
        Ok(action)
    }
}

impl Serialize for DeliveryRuleAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let name = self.discriminator();
        match self {
            Self::RouteConfigurationOverride(p) => RawVariant::serialize_tagged(serializer, name, p),
            Self::ModifyRequestHeader(p) | Self::ModifyResponseHeader(p) => {
                RawVariant::serialize_tagged(serializer, name, p)
            }
            Self::UrlRedirect(p) => RawVariant::serialize_tagged(serializer, name, p),
            Self::UrlRewrite(p) => RawVariant::serialize_tagged(serializer, name, p),
            Self::Unrecognized(raw) => raw.serialize(serializer),
        }
    }
}

// =============================================================================
// CONFIGURATION BLOCKS
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RouteConfigurationOverrideBlock {
    cdn_frontdoor_origin_group_id: String,
    #[serde(default)]
    forwarding_protocol: ForwardingProtocol,
    #[serde(default)]
    query_string_caching_behavior: QueryStringCachingBehavior,
    #[serde(default)]
    query_string_parameters: Vec<String>,
    #[serde(default)]
    compression_enabled: bool,
    #[serde(default)]
    cache_behavior: CacheBehavior,
    cache_duration: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct HeaderActionBlock {
    header_action: HeaderAction,
    header_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct UrlRedirectBlock {
    redirect_type: RedirectType,
    #[serde(default)]
    redirect_protocol: RedirectProtocol,
    #[serde(default)]
    destination_path: String,
    destination_hostname: String,
    #[serde(default)]
    query_string: String,
    #[serde(default)]
    destination_fragment: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct UrlRewriteBlock {
    source_pattern: String,
    destination: String,
    #[serde(default)]
    preserve_unmatched_path: bool,
}

// =============================================================================
// EXPAND / FLATTEN
// =============================================================================

fn expand_route_override(
    block: RouteConfigurationOverrideBlock,
) -> Result<DeliveryRuleAction, CodecError> {
    let origin_group = ORIGIN_GROUP
        .parse(&block.cdn_frontdoor_origin_group_id)
        .map_err(|e| CodecError::invalid("cdn_frontdoor_origin_group_id", e.to_string()))?;

    let behavior = block.query_string_caching_behavior;
    let parameters = &block.query_string_parameters;
    if parameters.len() > MAX_QUERY_STRING_PARAMETERS {
        return Err(CodecError::invalid(
            "query_string_parameters",
            format!(
                "may contain up to {MAX_QUERY_STRING_PARAMETERS} entries, got {}",
                parameters.len()
            ),
        ));
    }
    if behavior.takes_parameters() && parameters.is_empty() {
        return Err(CodecError::incompatible(
            "query_string_parameters",
            format!("is required when `query_string_caching_behavior` is `{behavior:?}`"),
        ));
    }
    if !behavior.takes_parameters() && !parameters.is_empty() {
        return Err(CodecError::incompatible(
            "query_string_parameters",
            format!("must be empty when `query_string_caching_behavior` is `{behavior:?}`"),
        ));
    }
    for parameter in parameters {
        not_empty("query_string_parameters", parameter)?;
        if parameter.contains(',') {
            return Err(CodecError::invalid(
                "query_string_parameters",
                format!("{parameter:?} may not contain a comma"),
            ));
        }
    }
    validate_cache_duration(&block.cache_duration)?;

    Ok(DeliveryRuleAction::RouteConfigurationOverride(
        RouteConfigurationOverrideParameters {
            origin_group_id: origin_group.render(),
            forwarding_protocol: block.forwarding_protocol,
            query_string_caching_behavior: behavior,
            query_parameters: (!parameters.is_empty()).then(|| parameters.join(",")),
            is_compression_enabled: block.compression_enabled,
            cache_behavior: block.cache_behavior,
            cache_duration: block.cache_duration,
        },
    ))
}

fn flatten_route_override(action: &DeliveryRuleAction) -> Result<Value, CodecError> {
    let DeliveryRuleAction::RouteConfigurationOverride(p) = action else {
        return Err(wrong_kind(ROUTE_CONFIGURATION_OVERRIDE, action.discriminator()));
    };
    let query_string_parameters = p
        .query_parameters
        .as_deref()
        .map(|csv| {
            csv.split(',')
                .map(str::trim)
                .filter(|parameter| !parameter.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    encode_block(
        ROUTE_CONFIGURATION_OVERRIDE,
        &RouteConfigurationOverrideBlock {
            cdn_frontdoor_origin_group_id: p.origin_group_id.clone(),
            forwarding_protocol: p.forwarding_protocol,
            query_string_caching_behavior: p.query_string_caching_behavior,
            query_string_parameters,
            compression_enabled: p.is_compression_enabled,
            cache_behavior: p.cache_behavior,
            cache_duration: p.cache_duration.clone(),
        },
    )
}

/// `[d.]HH:MM:SS`, at most `365.23:59:59`.
fn validate_cache_duration(value: &str) -> Result<(), CodecError> {
    let invalid = || {
        CodecError::invalid(
            "cache_duration",
            format!("{value:?} must be of the form `[d.]HH:MM:SS` and at most `365.23:59:59`"),
        )
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    let time = match value.split_once('.') {
        Some((days, time)) => {
            if !all_digits(days) || days.len() > 3 || days.starts_with('0') {
                return Err(invalid());
            }
            let days: u32 = days.parse().map_err(|_| invalid())?;
            if days > 365 {
                return Err(invalid());
            }
            time
        }
        None => value,
    };

    let parts: Vec<&str> = time.split(':').collect();
    if parts.len() != 3 || parts.iter().any(|part| part.len() != 2 || !all_digits(part)) {
        return Err(invalid());
    }
    let mut numbers = [0u32; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part.parse().map_err(|_| invalid())?;
    }
    let [hours, minutes, seconds] = numbers;
    if hours > 23 || minutes > 59 || seconds > 59 {
        return Err(invalid());
    }
    Ok(())
}

fn expand_header(block: HeaderActionBlock) -> Result<HeaderActionParameters, CodecError> {
    not_empty("header_name", &block.header_name)?;
    match (block.header_action, &block.value) {
        (HeaderAction::Delete, Some(_)) => {
            return Err(CodecError::incompatible(
                "value",
                "must not be set when `header_action` is `Delete`",
            ))
        }
        (HeaderAction::Delete, None) => {}
        (action, None) => {
            return Err(CodecError::incompatible(
                "value",
                format!("is required when `header_action` is `{action:?}`"),
            ))
        }
        (_, Some(value)) => not_empty("value", value)?,
    }
    Ok(HeaderActionParameters {
        header_action: block.header_action,
        header_name: block.header_name,
        value: block.value,
    })
}

fn flatten_header(kind: &str, p: &HeaderActionParameters) -> Result<Value, CodecError> {
    encode_block(
        kind,
        &HeaderActionBlock {
            header_action: p.header_action,
            header_name: p.header_name.clone(),
            value: p.value.clone(),
        },
    )
}

fn expand_redirect(block: UrlRedirectBlock) -> Result<DeliveryRuleAction, CodecError> {
    not_empty("destination_hostname", &block.destination_hostname)?;
    if !block.destination_path.is_empty() && !block.destination_path.starts_with('/') {
        return Err(CodecError::invalid("destination_path", "must begin with `/`"));
    }
    if block.query_string.starts_with('?') || block.query_string.starts_with('&') {
        return Err(CodecError::invalid(
            "query_string",
            "must not begin with `?` or `&`",
        ));
    }
    if block.destination_fragment.starts_with('#') {
        return Err(CodecError::invalid(
            "destination_fragment",
            "must not begin with `#`",
        ));
    }

    Ok(DeliveryRuleAction::UrlRedirect(UrlRedirectParameters {
        redirect_type: block.redirect_type,
        destination_protocol: block.redirect_protocol,
        custom_path: block.destination_path,
        custom_hostname: block.destination_hostname,
        custom_query_string: block.query_string,
        custom_fragment: block.destination_fragment,
    }))
}

fn flatten_redirect(action: &DeliveryRuleAction) -> Result<Value, CodecError> {
    let DeliveryRuleAction::UrlRedirect(p) = action else {
        return Err(wrong_kind(URL_REDIRECT, action.discriminator()));
    };
    encode_block(
        URL_REDIRECT,
        &UrlRedirectBlock {
            redirect_type: p.redirect_type,
            redirect_protocol: p.destination_protocol,
            destination_path: p.custom_path.clone(),
            destination_hostname: p.custom_hostname.clone(),
            query_string: p.custom_query_string.clone(),
            destination_fragment: p.custom_fragment.clone(),
        },
    )
}

fn expand_rewrite(block: UrlRewriteBlock) -> Result<DeliveryRuleAction, CodecError> {
    not_empty("source_pattern", &block.source_pattern)?;
    not_empty("destination", &block.destination)?;
    Ok(DeliveryRuleAction::UrlRewrite(UrlRewriteParameters {
        source_pattern: block.source_pattern,
        destination: block.destination,
        preserve_unmatched_path: block.preserve_unmatched_path,
    }))
}

fn flatten_rewrite(action: &DeliveryRuleAction) -> Result<Value, CodecError> {
    let DeliveryRuleAction::UrlRewrite(p) = action else {
        return Err(wrong_kind(URL_REWRITE, action.discriminator()));
    };
    encode_block(
        URL_REWRITE,
        &UrlRewriteBlock {
            source_pattern: p.source_pattern.clone(),
            destination: p.destination.clone(),
            preserve_unmatched_path: p.preserve_unmatched_path,
        },
    )
}

// =============================================================================
// REGISTRY
// =============================================================================

fn build_action_registry() -> Result<Registry<DeliveryRuleAction>, RegistryError> {
    Registry::<DeliveryRuleAction>::builder("actions", MAX_ACTIONS)
        .register(VariantKind::new(
            ROUTE_CONFIGURATION_OVERRIDE,
            "RouteConfigurationOverride",
            Cardinality::Singleton,
            |items| expand_blocks(ROUTE_CONFIGURATION_OVERRIDE, items, expand_route_override),
            flatten_route_override,
        ))
        .register(VariantKind::new(
            REQUEST_HEADER,
            "ModifyRequestHeader",
            Cardinality::Multi,
            |items| {
                expand_blocks(REQUEST_HEADER, items, |block| {
                    expand_header(block).map(DeliveryRuleAction::ModifyRequestHeader)
                })
            },
            |action| match action {
                DeliveryRuleAction::ModifyRequestHeader(p) => flatten_header(REQUEST_HEADER, p),
                other => Err(wrong_kind(REQUEST_HEADER, other.discriminator())),
            },
        ))
        .register(VariantKind::new(
            RESPONSE_HEADER,
            "ModifyResponseHeader",
            Cardinality::Multi,
            |items| {
                expand_blocks(RESPONSE_HEADER, items, |block| {
                    expand_header(block).map(DeliveryRuleAction::ModifyResponseHeader)
                })
            },
            |action| match action {
                DeliveryRuleAction::ModifyResponseHeader(p) => flatten_header(RESPONSE_HEADER, p),
                other => Err(wrong_kind(RESPONSE_HEADER, other.discriminator())),
            },
        ))
        .register(VariantKind::new(
            URL_REDIRECT,
            "UrlRedirect",
            Cardinality::Singleton,
            |items| expand_blocks(URL_REDIRECT, items, expand_redirect),
            flatten_redirect,
        ))
        .register(VariantKind::new(
            URL_REWRITE,
            "UrlRewrite",
            Cardinality::Singleton,
            |items| expand_blocks(URL_REWRITE, items, expand_rewrite),
            flatten_rewrite,
        ))
        .exclusive(&[URL_REDIRECT, URL_REWRITE])
        .exclusive(&[URL_REDIRECT, ROUTE_CONFIGURATION_OVERRIDE])
        .build()
}

/// The process-wide action registry, built on first use.
pub fn action_registry() -> Result<&'static Registry<DeliveryRuleAction>, RegistryError> {
    static ACTIONS: OnceLock<Result<Registry<DeliveryRuleAction>, RegistryError>> =
        OnceLock::new();
    ACTIONS
        .get_or_init(build_action_registry)
        .as_ref()
        .map_err(Clone::clone)
}

//! # Delivery Rule Conditions
//!
//! When a rule matches. There are nineteen condition kinds and every one of them may appear
//! any number of times, up to [`MAX_CONDITIONS`] conditions per rule in total.
//!
//! All kinds share one parameter shape (`operator`, `negate_condition`, `match_values`) and
//! differ only in their constraints: which operators they accept, whether they take
//! `transforms`, whether they carry a selector (the cookie, header or post argument to
//! inspect), and which match values are allowed. Those constraints live in one table of
//! [`ConditionSpec`]s, and the wire enum is generated from the same list so that adding a
//! kind touches exactly one place.

use super::{not_empty, wrong_kind};
use reconcile_framework::fragment::{decode_block, encode_block};
use reconcile_framework::{
    Cardinality, CodecError, Discriminated, RawVariant, Registry, RegistryError, VariantKind,
};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

pub const MAX_CONDITIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Any,
    Equal,
    Contains,
    BeginsWith,
    EndsWith,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    RegEx,
    #[serde(rename = "IPMatch")]
    IpMatch,
    GeoMatch,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Any => "Any",
            Operator::Equal => "Equal",
            Operator::Contains => "Contains",
            Operator::BeginsWith => "BeginsWith",
            Operator::EndsWith => "EndsWith",
            Operator::LessThan => "LessThan",
            Operator::LessThanOrEqual => "LessThanOrEqual",
            Operator::GreaterThan => "GreaterThan",
            Operator::GreaterThanOrEqual => "GreaterThanOrEqual",
            Operator::RegEx => "RegEx",
            Operator::IpMatch => "IPMatch",
            Operator::GeoMatch => "GeoMatch",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Transform {
    Lowercase,
    RemoveNulls,
    Trim,
    Uppercase,
    UrlDecode,
    UrlEncode,
}

const STANDARD: &[Operator] = &[
    Operator::Any,
    Operator::Equal,
    Operator::Contains,
    Operator::BeginsWith,
    Operator::EndsWith,
    Operator::LessThan,
    Operator::LessThanOrEqual,
    Operator::GreaterThan,
    Operator::GreaterThanOrEqual,
    Operator::RegEx,
];
const EQUAL_ONLY: &[Operator] = &[Operator::Equal];
const REMOTE_ADDRESS: &[Operator] = &[Operator::IpMatch, Operator::GeoMatch, Operator::Any];
const SOCKET_ADDRESS: &[Operator] = &[Operator::IpMatch, Operator::Any];

/// Wire parameters shared by every condition kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionParameters {
    pub operator: Operator,
    #[serde(default)]
    pub negate_condition: bool,
    #[serde(default)]
    pub match_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<Transform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum MatchValues {
    /// Governed by the operator alone.
    Free,
    /// At least one value, whatever the operator.
    Required,
    OneOf(&'static [&'static str]),
}

/// The constraints of one condition kind.
#[derive(Debug, Clone, Copy)]
pub struct ConditionSpec {
    config_name: &'static str,
    discriminator: &'static str,
    operators: &'static [Operator],
    selector: Option<&'static str>,
    transforms: bool,
    values: MatchValues,
}

impl ConditionSpec {
    const fn new(config_name: &'static str) -> Self {
        Self {
            config_name,
            discriminator: "",
            operators: STANDARD,
            selector: None,
            transforms: false,
            values: MatchValues::Free,
        }
    }

    const fn tagged(mut self, discriminator: &'static str) -> Self {
        self.discriminator = discriminator;
        self
    }

    const fn operators(mut self, operators: &'static [Operator]) -> Self {
        self.operators = operators;
        self
    }

    const fn selector(mut self, field: &'static str) -> Self {
        self.selector = Some(field);
        self
    }

    const fn with_transforms(mut self) -> Self {
        self.transforms = true;
        self
    }

    const fn values(mut self, values: MatchValues) -> Self {
        self.values = values;
        self
    }

    pub fn config_name(&self) -> &'static str {
        self.config_name
    }

    pub fn discriminator(&self) -> &'static str {
        self.discriminator
    }
}

macro_rules! condition_kinds {
    ($( $variant:ident => $spec:expr, )+) => {
        /// One condition as the management plane stores it. Variant names are the wire
        /// discriminators.
        #[derive(Debug, Clone, PartialEq, Deserialize)]
        #[serde(try_from = "RawVariant")]
        pub enum DeliveryRuleCondition {
            $( $variant(ConditionParameters), )+
            Unrecognized(RawVariant),
        }

        impl DeliveryRuleCondition {
            fn from_parts(discriminator: &str, parameters: ConditionParameters) -> Option<Self> {
                $(
                    if discriminator == stringify!($variant) {
                        return Some(Self::$variant(parameters));
                    }
                )+
                None
            }

            /// The shared parameters, or the raw envelope of an unrecognized variant.
            pub fn parameters(&self) -> Result<&ConditionParameters, &RawVariant> {
                match self {
                    $( Self::$variant(parameters) )|+ => Ok(parameters),
                    Self::Unrecognized(raw) => Err(raw),
                }
            }
        }

        impl Discriminated for DeliveryRuleCondition {
            fn discriminator(&self) -> &str {
                match self {
                    $( Self::$variant(_) => stringify!($variant), )+
                    Self::Unrecognized(raw) => &raw.name,
                }
            }
        }

        /// Declaration order is wire order.
        static CONDITION_SPECS: &[ConditionSpec] = &[
            $( $spec.tagged(stringify!($variant)), )+
        ];
    };
}

condition_kinds! {
    ClientPort => ConditionSpec::new("client_port_condition"),
    Cookies => ConditionSpec::new("cookies_condition").selector("cookie_name").with_transforms(),
    HostName => ConditionSpec::new("host_name_condition").with_transforms(),
    HttpVersion => ConditionSpec::new("http_version_condition")
        .operators(EQUAL_ONLY)
        .values(MatchValues::OneOf(&["2.0", "1.1", "1.0", "0.9"])),
    IsDevice => ConditionSpec::new("is_device_condition")
        .operators(EQUAL_ONLY)
        .values(MatchValues::OneOf(&["Mobile", "Desktop"])),
    PostArgs => ConditionSpec::new("post_args_condition").selector("post_args_name").with_transforms(),
    QueryString => ConditionSpec::new("query_string_condition").with_transforms(),
    RemoteAddress => ConditionSpec::new("remote_address_condition").operators(REMOTE_ADDRESS),
    RequestBody => ConditionSpec::new("request_body_condition")
        .values(MatchValues::Required)
        .with_transforms(),
    RequestHeader => ConditionSpec::new("request_header_condition").selector("header_name").with_transforms(),
    RequestMethod => ConditionSpec::new("request_method_condition")
        .operators(EQUAL_ONLY)
        .values(MatchValues::OneOf(&["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS", "TRACE"])),
    RequestScheme => ConditionSpec::new("request_scheme_condition")
        .operators(EQUAL_ONLY)
        .values(MatchValues::OneOf(&["HTTP", "HTTPS"])),
    RequestUri => ConditionSpec::new("request_uri_condition").with_transforms(),
    ServerPort => ConditionSpec::new("server_port_condition").values(MatchValues::OneOf(&["80", "443"])),
    SocketAddr => ConditionSpec::new("socket_address_condition").operators(SOCKET_ADDRESS),
    SslProtocol => ConditionSpec::new("ssl_protocol_condition")
        .operators(EQUAL_ONLY)
        .values(MatchValues::OneOf(&["TLSv1", "TLSv1.1", "TLSv1.2"])),
    UrlFileExtension => ConditionSpec::new("url_file_extension_condition")
        .values(MatchValues::Required)
        .with_transforms(),
    UrlFileName => ConditionSpec::new("url_filename_condition")
        .values(MatchValues::Required)
        .with_transforms(),
    UrlPath => ConditionSpec::new("url_path_condition").with_transforms(),
}

impl TryFrom<RawVariant> for DeliveryRuleCondition {
    type Error = serde_json::Error;

    fn try_from(raw: RawVariant) -> Result<Self, Self::Error> {
        let known = CONDITION_SPECS
            .iter()
            .any(|spec| spec.discriminator == raw.name);
        if !known {
            return Ok(Self::Unrecognized(raw));
        }
        let parameters = serde_json::from_value(raw.parameters.clone())?;
        Ok(Self::from_parts(&raw.name, parameters).unwrap_or(Self::Unrecognized(raw)))
    }
}

impl Serialize for DeliveryRuleCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.parameters() {
            Ok(parameters) => {
                RawVariant::serialize_tagged(serializer, self.discriminator(), parameters)
            }
            Err(raw) => raw.serialize(serializer),
        }
    }
}

/// The configuration block minus the selector, which is named per kind.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConditionBlock {
    operator: Operator,
    #[serde(default)]
    negate_condition: bool,
    #[serde(default)]
    match_values: Vec<String>,
    #[serde(default)]
    transforms: Option<Vec<Transform>>,
}

impl ConditionSpec {
    fn expand(&self, items: &[Value]) -> Result<Vec<DeliveryRuleCondition>, CodecError> {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let path = format!("{}.{index}", self.config_name);
                let Value::Object(fields) = item else {
                    return Err(CodecError::invalid(path, "expected a block"));
                };
                let mut fields = fields.clone();
                let selector = match self.selector {
                    Some(field) => {
                        Some(take_selector(&mut fields, field).map_err(|e| e.within(&path))?)
                    }
                    None => None,
                };
                let block: ConditionBlock = decode_block(&path, &Value::Object(fields))?;
                let parameters = self
                    .validate(block, selector)
                    .map_err(|e| e.within(&path))?;
                DeliveryRuleCondition::from_parts(self.discriminator, parameters).ok_or_else(
                    || CodecError::invalid(path, format!("no wire variant `{}`", self.discriminator)),
                )
            })
            .collect()
    }

    fn validate(
        &self,
        block: ConditionBlock,
        selector: Option<String>,
    ) -> Result<ConditionParameters, CodecError> {
        let operator = block.operator;
        if !self.operators.contains(&operator) {
            let allowed: Vec<_> = self.operators.iter().map(|op| op.as_str()).collect();
            return Err(CodecError::invalid(
                "operator",
                format!("`{operator}` is not supported, expected one of {}", allowed.join(", ")),
            ));
        }

        let transforms = match block.transforms {
            Some(transforms) if !self.transforms && !transforms.is_empty() => {
                return Err(CodecError::invalid(
                    "transforms",
                    format!("is not supported by `{}`", self.config_name),
                ))
            }
            Some(transforms) => transforms,
            None => Vec::new(),
        };
        if transforms.iter().collect::<BTreeSet<_>>().len() != transforms.len() {
            return Err(CodecError::invalid("transforms", "may not contain duplicates"));
        }

        let values = &block.match_values;
        if matches!(self.values, MatchValues::Required) && values.is_empty() {
            return Err(CodecError::invalid("match_values", "is required"));
        }
        if operator == Operator::Any && !values.is_empty() {
            return Err(CodecError::incompatible(
                "match_values",
                "must be empty when `operator` is `Any`",
            ));
        }
        if operator != Operator::Any && values.is_empty() {
            return Err(CodecError::incompatible(
                "match_values",
                format!("at least one value is required when `operator` is `{operator}`"),
            ));
        }
        if let MatchValues::OneOf(allowed) = self.values {
            if let Some(value) = values.iter().find(|v| !allowed.contains(&v.as_str())) {
                return Err(CodecError::invalid(
                    "match_values",
                    format!("{value:?} is not one of {}", allowed.join(", ")),
                ));
            }
        }

        Ok(ConditionParameters {
            operator,
            negate_condition: block.negate_condition,
            match_values: block.match_values,
            transforms,
            selector,
        })
    }

    fn flatten(&self, condition: &DeliveryRuleCondition) -> Result<Value, CodecError> {
        let parameters = match condition.parameters() {
            Ok(parameters) if condition.discriminator() == self.discriminator => parameters,
            _ => return Err(wrong_kind(self.config_name, condition.discriminator())),
        };

        let mut block = Map::new();
        if let Some(field) = self.selector {
            let selector = parameters.selector.clone().ok_or_else(|| {
                CodecError::invalid(
                    format!("{}.{field}", self.config_name),
                    "missing from the stored condition",
                )
            })?;
            block.insert(field.to_string(), Value::String(selector));
        }
        block.insert(
            "operator".to_string(),
            Value::String(parameters.operator.as_str().to_string()),
        );
        block.insert(
            "negate_condition".to_string(),
            Value::Bool(parameters.negate_condition),
        );
        block.insert(
            "match_values".to_string(),
            encode_block("match_values", &parameters.match_values)?,
        );
        if self.transforms {
            block.insert(
                "transforms".to_string(),
                encode_block("transforms", &parameters.transforms)?,
            );
        }
        Ok(Value::Object(block))
    }
}

fn take_selector(fields: &mut Map<String, Value>, field: &str) -> Result<String, CodecError> {
    match fields.remove(field) {
        Some(Value::String(selector)) => {
            not_empty(field, &selector)?;
            Ok(selector)
        }
        None | Some(Value::Null) => Err(CodecError::invalid(field, "is required")),
        Some(_) => Err(CodecError::invalid(field, "expected a string")),
    }
}

fn build_condition_registry() -> Result<Registry<DeliveryRuleCondition>, RegistryError> {
    CONDITION_SPECS
        .iter()
        .fold(
            Registry::<DeliveryRuleCondition>::builder("conditions", MAX_CONDITIONS),
            |builder, spec| {
                builder.register(VariantKind::new(
                    spec.config_name,
                    spec.discriminator,
                    Cardinality::Multi,
                    move |items| spec.expand(items),
                    move |condition| spec.flatten(condition),
                ))
            },
        )
        .build()
}

/// The process-wide condition registry, built on first use.
pub fn condition_registry() -> Result<&'static Registry<DeliveryRuleCondition>, RegistryError> {
    static CONDITIONS: OnceLock<Result<Registry<DeliveryRuleCondition>, RegistryError>> =
        OnceLock::new();
    CONDITIONS
        .get_or_init(build_condition_registry)
        .as_ref()
        .map_err(Clone::clone)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile_framework::codec;
    use serde_json::json;

    fn registry() -> &'static Registry<DeliveryRuleCondition> {
        condition_registry().unwrap()
    }

    fn equal(value: &str) -> Value {
        json!({ "operator": "Equal", "match_values": [value] })
    }

    /// Eleven kinds that accept an `Equal` condition, selectors filled in where needed.
    fn eleven_kinds() -> Vec<(&'static str, Value)> {
        vec![
            ("client_port_condition", equal("8080")),
            ("host_name_condition", equal("contoso.com")),
            ("query_string_condition", equal("a=b")),
            ("request_body_condition", equal("x")),
            ("request_uri_condition", equal("/a")),
            ("url_file_extension_condition", equal("jpg")),
            ("url_filename_condition", equal("index.html")),
            ("url_path_condition", equal("/a")),
            ("cookies_condition", json!({ "cookie_name": "c", "operator": "Equal", "match_values": ["1"] })),
            ("post_args_condition", json!({ "post_args_name": "p", "operator": "Equal", "match_values": ["1"] })),
            ("request_header_condition", json!({ "header_name": "h", "operator": "Equal", "match_values": ["1"] })),
        ]
    }

    fn block(entries: &[(&'static str, Value)]) -> Value {
        let mut block = Map::new();
        for (kind, entry) in entries {
            block.insert(kind.to_string(), json!([entry]));
        }
        Value::Object(block)
    }

    #[test]
    fn test_every_kind_is_registered_in_declaration_order() {
        let names: Vec<_> = registry().kinds().map(|k| k.config_name()).collect();
        assert_eq!(names.len(), 19);
        assert_eq!(names.first(), Some(&"client_port_condition"));
        assert_eq!(names.last(), Some(&"url_path_condition"));
        assert_eq!(
            registry().lookup("socket_address_condition").unwrap().discriminator(),
            "SocketAddr"
        );
    }

    #[test]
    fn test_ten_conditions_fit_eleven_do_not() {
        let kinds = eleven_kinds();

        let ten = block(&kinds[..10]);
        assert_eq!(codec::expand(Some(&ten), registry()).unwrap().len(), 10);

        let eleven = block(&kinds);
        assert_eq!(
            codec::expand(Some(&eleven), registry()).unwrap_err(),
            CodecError::CeilingExceeded {
                field: "conditions",
                ceiling: MAX_CONDITIONS,
                count: 11
            }
        );
    }

    #[test]
    fn test_round_trip_with_selector_and_transforms() {
        let desired = json!({
            "request_header_condition": [{
                "header_name": "User-Agent",
                "operator": "Contains",
                "match_values": ["bot"],
                "transforms": ["Lowercase", "Trim"]
            }],
            "request_method_condition": [{ "operator": "Equal", "match_values": ["GET", "HEAD"] }],
        });

        let wire = codec::expand(Some(&desired), registry()).unwrap();
        assert_eq!(wire.len(), 2);
        assert_eq!(wire[0].discriminator(), "RequestHeader");
        assert_eq!(
            wire[0].parameters().unwrap().selector.as_deref(),
            Some("User-Agent")
        );

        let flattened = codec::flatten(&wire, registry()).unwrap();
        assert_eq!(
            flattened["request_header_condition"],
            json!([{
                "header_name": "User-Agent",
                "operator": "Contains",
                "negate_condition": false,
                "match_values": ["bot"],
                "transforms": ["Lowercase", "Trim"]
            }])
        );
        assert_eq!(
            flattened["request_method_condition"],
            json!([{ "operator": "Equal", "negate_condition": false, "match_values": ["GET", "HEAD"] }])
        );
        assert_eq!(flattened["url_path_condition"], json!([]));
    }

    /// A fully specified block per kind, written exactly as flatten renders it.
    fn sample(config_name: &str) -> Value {
        match config_name {
            "client_port_condition" => json!({ "operator": "Equal", "negate_condition": true, "match_values": ["8080"] }),
            "cookies_condition" => json!({ "cookie_name": "session", "operator": "BeginsWith", "negate_condition": false, "match_values": ["abc"], "transforms": ["Lowercase"] }),
            "host_name_condition" => json!({ "operator": "Equal", "negate_condition": false, "match_values": ["contoso.com"], "transforms": ["Trim"] }),
            "http_version_condition" => json!({ "operator": "Equal", "negate_condition": false, "match_values": ["2.0"] }),
            "is_device_condition" => json!({ "operator": "Equal", "negate_condition": true, "match_values": ["Mobile"] }),
            "post_args_condition" => json!({ "post_args_name": "q", "operator": "Contains", "negate_condition": false, "match_values": ["x"], "transforms": ["UrlDecode", "Trim"] }),
            "query_string_condition" => json!({ "operator": "RegEx", "negate_condition": false, "match_values": ["^a=.*"], "transforms": [] }),
            "remote_address_condition" => json!({ "operator": "GeoMatch", "negate_condition": false, "match_values": ["US", "CA"] }),
            "request_body_condition" => json!({ "operator": "Contains", "negate_condition": false, "match_values": ["token"], "transforms": ["Uppercase"] }),
            "request_header_condition" => json!({ "header_name": "Accept", "operator": "Equal", "negate_condition": false, "match_values": ["application/json"], "transforms": [] }),
            "request_method_condition" => json!({ "operator": "Equal", "negate_condition": false, "match_values": ["GET", "POST"] }),
            "request_scheme_condition" => json!({ "operator": "Equal", "negate_condition": false, "match_values": ["HTTPS"] }),
            "request_uri_condition" => json!({ "operator": "Any", "negate_condition": false, "match_values": [], "transforms": [] }),
            "server_port_condition" => json!({ "operator": "Equal", "negate_condition": false, "match_values": ["443"] }),
            "socket_address_condition" => json!({ "operator": "IPMatch", "negate_condition": true, "match_values": ["192.168.0.0/16"] }),
            "ssl_protocol_condition" => json!({ "operator": "Equal", "negate_condition": false, "match_values": ["TLSv1.2"] }),
            "url_file_extension_condition" => json!({ "operator": "Equal", "negate_condition": false, "match_values": ["jpg"], "transforms": ["Lowercase"] }),
            "url_filename_condition" => json!({ "operator": "EndsWith", "negate_condition": false, "match_values": ["index.html"], "transforms": [] }),
            "url_path_condition" => json!({ "operator": "BeginsWith", "negate_condition": false, "match_values": ["/api"], "transforms": ["RemoveNulls"] }),
            other => panic!("no sample for {other}"),
        }
    }

    #[test]
    fn test_every_kind_round_trips() {
        for kind in registry().kinds() {
            let name = kind.config_name();
            let desired = json!({ name: [sample(name)] });

            let wire = codec::expand(Some(&desired), registry()).unwrap();
            assert_eq!(wire.len(), 1, "{name}");
            assert_eq!(wire[0].discriminator(), kind.discriminator(), "{name}");

            let flattened = codec::flatten(&wire, registry()).unwrap();
            for (other, value) in flattened.as_object().unwrap() {
                if other == name {
                    assert_eq!(value, &json!([sample(name)]), "{name}");
                } else {
                    assert_eq!(value, &json!([]), "{name} leaked into {other}");
                }
            }
        }
    }

    #[test]
    fn test_operator_any_and_match_values() {
        let any_with_values = json!({ "host_name_condition": [{ "operator": "Any", "match_values": ["x"] }] });
        assert!(matches!(
            codec::expand(Some(&any_with_values), registry()),
            Err(CodecError::IncompatibleCombination { ref field, .. })
                if field == "conditions.host_name_condition.0.match_values"
        ));

        let any_alone = json!({ "host_name_condition": [{ "operator": "Any" }] });
        assert!(codec::expand(Some(&any_alone), registry()).is_ok());

        let equal_without_values = json!({ "host_name_condition": [{ "operator": "Equal" }] });
        assert!(matches!(
            codec::expand(Some(&equal_without_values), registry()),
            Err(CodecError::IncompatibleCombination { .. })
        ));

        let required = json!({ "url_filename_condition": [{ "operator": "Any" }] });
        assert!(matches!(
            codec::expand(Some(&required), registry()),
            Err(CodecError::InvalidField { ref reason, .. }) if reason == "is required"
        ));
    }

    #[test]
    fn test_kind_constraints() {
        let contains_on_equal_only = json!({ "is_device_condition": [{ "operator": "Contains", "match_values": ["Mobile"] }] });
        assert!(codec::expand(Some(&contains_on_equal_only), registry()).is_err());

        let bad_value = json!({ "ssl_protocol_condition": [equal("SSLv3")] });
        assert!(matches!(
            codec::expand(Some(&bad_value), registry()),
            Err(CodecError::InvalidField { ref field, .. })
                if field == "conditions.ssl_protocol_condition.0.match_values"
        ));

        let geo = json!({ "remote_address_condition": [{ "operator": "GeoMatch", "match_values": ["US"] }] });
        assert!(codec::expand(Some(&geo), registry()).is_ok());
        let geo_on_socket = json!({ "socket_address_condition": [{ "operator": "GeoMatch", "match_values": ["US"] }] });
        assert!(codec::expand(Some(&geo_on_socket), registry()).is_err());

        let transforms_on_port = json!({ "server_port_condition": [{ "operator": "Equal", "match_values": ["443"], "transforms": ["Trim"] }] });
        assert!(matches!(
            codec::expand(Some(&transforms_on_port), registry()),
            Err(CodecError::InvalidField { ref field, .. })
                if field == "conditions.server_port_condition.0.transforms"
        ));
    }

    #[test]
    fn test_selector_is_required() {
        let missing = json!({ "cookies_condition": [equal("1")] });
        assert_eq!(
            codec::expand(Some(&missing), registry()).unwrap_err(),
            CodecError::invalid("conditions.cookies_condition.0.cookie_name", "is required")
        );
    }

    #[test]
    fn test_unknown_discriminator_fails_flatten() {
        let known = codec::expand(Some(&json!({ "url_path_condition": [equal("/a")] })), registry())
            .unwrap();
        let unknown: DeliveryRuleCondition = serde_json::from_value(json!({
            "name": "ClientCertificate",
            "parameters": { "operator": "Any" }
        }))
        .unwrap();
        assert!(unknown.parameters().is_err());

        let sequence = [known[0].clone(), unknown];
        assert_eq!(
            codec::flatten(&sequence, registry()).unwrap_err(),
            CodecError::UnrecognizedVariant {
                field: "conditions",
                discriminator: "ClientCertificate".into()
            }
        );
    }

    #[test]
    fn test_wire_envelope() {
        let wire = codec::expand(
            Some(&json!({ "socket_address_condition": [{ "operator": "IPMatch", "match_values": ["10.0.0.0/8"] }] })),
            registry(),
        )
        .unwrap();
        let encoded = serde_json::to_value(&wire[0]).unwrap();
        assert_eq!(
            encoded,
            json!({
                "name": "SocketAddr",
                "parameters": { "operator": "IPMatch", "negateCondition": false, "matchValues": ["10.0.0.0/8"] }
            })
        );
        assert_eq!(serde_json::from_value::<DeliveryRuleCondition>(encoded).unwrap(), wire[0]);
    }
}

//! # Discriminated Mapping Registry
//!
//! A catalog of the variant kinds one composite field can hold (e.g. the five kinds of rule
//! action). Each [`VariantKind`] pairs a stable configuration name with the wire
//! discriminator the management plane uses, a cardinality class, and the expand/flatten
//! functions crossing the boundary between desired state and wire format.
//!
//! A [`Registry`] is assembled once through [`RegistryBuilder`] and never mutated afterwards,
//! so it can live in a process-wide `OnceLock` and be read from any task without locking.
//! Declaration order is significant: it is the order in which the codec visits kinds and
//! therefore the order of variants in an expanded wire sequence.

use crate::error::{CodecError, RegistryError};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;

/// A wire value that carries a discriminator tag.
///
/// Wire types are closed enums with one arm per kind, plus an arm holding a [`RawVariant`]
/// for discriminators this build does not know about.
pub trait Discriminated {
    fn discriminator(&self) -> &str;
}

/// The untyped `{ "name": ..., "parameters": {...} }` envelope of a wire variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVariant {
    pub name: String,
    #[serde(default)]
    pub parameters: Value,
}

impl RawVariant {
    /// Writes a typed variant in the same envelope shape, for wire enums with hand-written
    /// `Serialize` impls.
    pub fn serialize_tagged<S, P>(serializer: S, name: &str, parameters: &P) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        P: Serialize + ?Sized,
    {
        let mut envelope = serializer.serialize_struct("RawVariant", 2)?;
        envelope.serialize_field("name", name)?;
        envelope.serialize_field("parameters", parameters)?;
        envelope.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one wire variant of this kind per composite.
    Singleton,
    Multi,
}

type ExpandFn<W> = Box<dyn Fn(&[Value]) -> Result<Vec<W>, CodecError> + Send + Sync>;
type FlattenFn<W> = Box<dyn Fn(&W) -> Result<Value, CodecError> + Send + Sync>;

/// One entry of a registry.
pub struct VariantKind<W> {
    config_name: &'static str,
    discriminator: &'static str,
    cardinality: Cardinality,
    expand: ExpandFn<W>,
    flatten: FlattenFn<W>,
}

impl<W> VariantKind<W> {
    pub fn new<E, F>(
        config_name: &'static str,
        discriminator: &'static str,
        cardinality: Cardinality,
        expand: E,
        flatten: F,
    ) -> Self
    where
        E: Fn(&[Value]) -> Result<Vec<W>, CodecError> + Send + Sync + 'static,
        F: Fn(&W) -> Result<Value, CodecError> + Send + Sync + 'static,
    {
        Self {
            config_name,
            discriminator,
            cardinality,
            expand: Box::new(expand),
            flatten: Box::new(flatten),
        }
    }

    pub fn config_name(&self) -> &'static str {
        self.config_name
    }

    pub fn discriminator(&self) -> &'static str {
        self.discriminator
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Desired-state entries of this kind -> wire variants.
    pub fn expand(&self, items: &[Value]) -> Result<Vec<W>, CodecError> {
        (self.expand)(items)
    }

    /// One wire variant of this kind -> its desired-state entry.
    pub fn flatten(&self, variant: &W) -> Result<Value, CodecError> {
        (self.flatten)(variant)
    }
}

impl<W> std::fmt::Debug for VariantKind<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantKind")
            .field("config_name", &self.config_name)
            .field("discriminator", &self.discriminator)
            .field("cardinality", &self.cardinality)
            .finish_non_exhaustive()
    }
}

/// The immutable catalog for one composite field.
#[derive(Debug)]
pub struct Registry<W> {
    field: &'static str,
    ceiling: usize,
    kinds: Vec<VariantKind<W>>,
    by_name: HashMap<&'static str, usize>,
    by_discriminator: HashMap<&'static str, usize>,
    exclusive: Vec<Vec<&'static str>>,
}

impl<W: Discriminated> Registry<W> {
    pub fn builder(field: &'static str, ceiling: usize) -> RegistryBuilder<W> {
        RegistryBuilder {
            field,
            ceiling,
            kinds: Vec::new(),
            exclusive: Vec::new(),
        }
    }

    /// Name of the composite field this registry describes (e.g. `actions`).
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Maximum number of wire variants across all kinds.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Kinds in declaration order.
    pub fn kinds(&self) -> impl Iterator<Item = &VariantKind<W>> {
        self.kinds.iter()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn lookup(&self, config_name: &str) -> Option<&VariantKind<W>> {
        self.by_name.get(config_name).map(|&index| &self.kinds[index])
    }

    /// Finds the kind of a wire variant by its discriminator tag.
    pub fn classify(&self, variant: &W) -> Result<&VariantKind<W>, CodecError> {
        self.classify_indexed(variant).map(|(_, kind)| kind)
    }

    /// Like [`Registry::classify`], also returning the kind's declaration index.
    pub(crate) fn classify_indexed(&self, variant: &W) -> Result<(usize, &VariantKind<W>), CodecError> {
        let discriminator = variant.discriminator();
        match self.by_discriminator.get(discriminator) {
            Some(&index) => Ok((index, &self.kinds[index])),
            None => Err(CodecError::UnrecognizedVariant {
                field: self.field,
                discriminator: discriminator.to_string(),
            }),
        }
    }

    /// Groups of kinds of which at most one may be present at a time.
    pub(crate) fn exclusive_groups(&self) -> &[Vec<&'static str>] {
        &self.exclusive
    }
}

/// Collects kinds during initialization.
pub struct RegistryBuilder<W> {
    field: &'static str,
    ceiling: usize,
    kinds: Vec<VariantKind<W>>,
    exclusive: Vec<Vec<&'static str>>,
}

impl<W: Discriminated> RegistryBuilder<W> {
    pub fn register(mut self, kind: VariantKind<W>) -> Self {
        self.kinds.push(kind);
        self
    }

    /// Declares that at most one of the named kinds may be present in a composite.
    pub fn exclusive(mut self, config_names: &[&'static str]) -> Self {
        self.exclusive.push(config_names.to_vec());
        self
    }

    pub fn build(self) -> Result<Registry<W>, RegistryError> {
        let mut by_name = HashMap::with_capacity(self.kinds.len());
        let mut by_discriminator = HashMap::with_capacity(self.kinds.len());

        for (index, kind) in self.kinds.iter().enumerate() {
            if by_name.insert(kind.config_name, index).is_some() {
                return Err(RegistryError::DuplicateName(kind.config_name));
            }
            if by_discriminator.insert(kind.discriminator, index).is_some() {
                return Err(RegistryError::DuplicateDiscriminator(kind.discriminator));
            }
        }

        for name in self.exclusive.iter().flatten() {
            if !by_name.contains_key(name) {
                return Err(RegistryError::UnknownKind(name));
            }
        }

        Ok(Registry {
            field: self.field,
            ceiling: self.ceiling,
            kinds: self.kinds,
            by_name,
            by_discriminator,
            exclusive: self.exclusive,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// A two-kind wire type shared by the registry and codec tests.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Signal {
        Beep(u64),
        Blink(String),
        Unrecognized(RawVariant),
    }

    impl Discriminated for Signal {
        fn discriminator(&self) -> &str {
            match self {
                Signal::Beep(_) => "Beep",
                Signal::Blink(_) => "Blink",
                Signal::Unrecognized(raw) => &raw.name,
            }
        }
    }

    pub fn beep_kind(cardinality: Cardinality) -> VariantKind<Signal> {
        VariantKind::new(
            "beep",
            "Beep",
            cardinality,
            |items| {
                items
                    .iter()
                    .map(|item| {
                        item["hz"]
                            .as_u64()
                            .map(Signal::Beep)
                            .ok_or_else(|| CodecError::invalid("beep.hz", "expected an integer"))
                    })
                    .collect()
            },
            |signal| match signal {
                Signal::Beep(hz) => Ok(json!({ "hz": hz })),
                _ => Err(CodecError::invalid("beep", "not a beep")),
            },
        )
    }

    pub fn blink_kind() -> VariantKind<Signal> {
        VariantKind::new(
            "blink",
            "Blink",
            Cardinality::Multi,
            |items| {
                Ok(items
                    .iter()
                    .map(|item| Signal::Blink(item["color"].as_str().unwrap_or("red").to_string()))
                    .collect())
            },
            |signal| match signal {
                Signal::Blink(color) => Ok(json!({ "color": color })),
                _ => Err(CodecError::invalid("blink", "not a blink")),
            },
        )
    }

    #[test]
    fn test_lookup_and_classify() {
        let registry = Registry::builder("signals", 3)
            .register(beep_kind(Cardinality::Singleton))
            .register(blink_kind())
            .build()
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("blink").unwrap().discriminator(), "Blink");
        assert!(registry.lookup("buzz").is_none());
        assert_eq!(
            registry.classify(&Signal::Beep(440)).unwrap().config_name(),
            "beep"
        );
    }

    #[test]
    fn test_classify_unknown_discriminator_is_an_error() {
        let registry = Registry::builder("signals", 3)
            .register(blink_kind())
            .build()
            .unwrap();

        let unknown = Signal::Unrecognized(RawVariant {
            name: "Buzz".into(),
            parameters: Value::Null,
        });
        assert_eq!(
            registry.classify(&unknown).unwrap_err(),
            CodecError::UnrecognizedVariant {
                field: "signals",
                discriminator: "Buzz".into()
            }
        );
        // Kinds missing from the registry are unrecognized too, even if the type knows them.
        assert!(registry.classify(&Signal::Beep(1)).is_err());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let result = Registry::builder("signals", 3)
            .register(blink_kind())
            .register(blink_kind())
            .build();
        assert_eq!(result.unwrap_err(), RegistryError::DuplicateName("blink"));
    }

    #[test]
    fn test_exclusive_group_must_name_registered_kinds() {
        let result = Registry::builder("signals", 3)
            .register(blink_kind())
            .exclusive(&["blink", "beep"])
            .build();
        assert_eq!(result.unwrap_err(), RegistryError::UnknownKind("beep"));
    }

    #[test]
    fn test_declaration_order_is_preserved() {
        let registry = Registry::builder("signals", 3)
            .register(blink_kind())
            .register(beep_kind(Cardinality::Multi))
            .build()
            .unwrap();
        let names: Vec<_> = registry.kinds().map(|k| k.config_name()).collect();
        assert_eq!(names, ["blink", "beep"]);

        let (index, kind) = registry.classify_indexed(&Signal::Beep(1)).unwrap();
        assert_eq!((index, kind.config_name()), (1, "beep"));
    }
}

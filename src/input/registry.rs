// Known type tags and their decoders, used when loading a configuration

use super::binding::decode_boxed;
use super::{
    BindingRecord, ConfigError, ConfigResult, Fields, ParseIdentifier, SourceKind, TypeKind,
    TypedBinding,
};
use log::warn;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

type BindingDecoder = fn(&Fields) -> ConfigResult<Box<dyn BindingRecord>>;
type IdentifierDecoder<T> = Box<dyn Fn(&str) -> Result<T, String> + Send + Sync>;

/// Closed set of types a saved configuration may contain
///
/// Every tag in a snapshot (source kinds, binding records, identifiers) is
/// resolved here. Loading fails on the first tag nobody registered.
pub struct Registry<T> {
    source_kinds: BTreeMap<&'static str, SourceKind>,
    bindings: HashMap<&'static str, BindingDecoder>,
    identifiers: HashMap<&'static str, IdentifierDecoder<T>>,
}

impl<T> Registry<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            source_kinds: BTreeMap::new(),
            bindings: HashMap::new(),
            identifiers: HashMap::new(),
        }
    }

    /// Register a source kind
    pub fn register_source_kind(&mut self, kind: SourceKind) {
        self.source_kinds.insert(kind.as_str(), kind);
    }

    /// Register a binding record type under `B::TAG`
    pub fn register_binding<B: TypedBinding>(&mut self) {
        if self.bindings.insert(B::TAG, decode_boxed::<B>).is_some() {
            warn!("Binding type '{}' registered twice, keeping the latest", B::TAG);
        }
    }

    /// Register a decoder for identifiers tagged `tag`
    pub fn register_identifier<F>(&mut self, tag: &'static str, decoder: F)
    where
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        if self.identifiers.insert(tag, Box::new(decoder)).is_some() {
            warn!("Identifier type '{}' registered twice, keeping the latest", tag);
        }
    }

    pub fn with_source_kind(mut self, kind: SourceKind) -> Self {
        self.register_source_kind(kind);
        self
    }

    pub fn with_binding<B: TypedBinding>(mut self) -> Self {
        self.register_binding::<B>();
        self
    }

    pub fn with_identifier<F>(mut self, tag: &'static str, decoder: F) -> Self
    where
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        self.register_identifier(tag, decoder);
        self
    }

    /// Resolve a saved source kind name
    pub fn source_kind(&self, name: &str) -> ConfigResult<SourceKind> {
        self.source_kinds
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::UnknownType {
                kind: TypeKind::Source,
                tag: name.to_string(),
            })
    }

    /// Rebuild a binding record from its tag and fields
    pub fn decode_binding(
        &self,
        tag: &str,
        fields: &Fields,
    ) -> ConfigResult<Box<dyn BindingRecord>> {
        let decoder = self.bindings.get(tag).ok_or_else(|| ConfigError::UnknownType {
            kind: TypeKind::Binding,
            tag: tag.to_string(),
        })?;
        decoder(fields)
    }

    /// Rebuild an identifier from its tag and text
    pub fn decode_identifier(&self, tag: &str, text: &str) -> ConfigResult<T> {
        let decoder = self
            .identifiers
            .get(tag)
            .ok_or_else(|| ConfigError::UnknownType {
                kind: TypeKind::Identifier,
                tag: tag.to_string(),
            })?;
        decoder(text).map_err(|reason| ConfigError::InvalidIdentifier {
            tag: tag.to_string(),
            text: text.to_string(),
            reason,
        })
    }

    pub fn has_source_kind(&self, name: &str) -> bool {
        self.source_kinds.contains_key(name)
    }

    pub fn has_binding(&self, tag: &str) -> bool {
        self.bindings.contains_key(tag)
    }

    pub fn has_identifier(&self, tag: &str) -> bool {
        self.identifiers.contains_key(tag)
    }
}

impl<T: ParseIdentifier> Registry<T> {
    /// Register `T`'s own decoder under `T::TAG`
    pub fn register_identifier_type(&mut self) {
        self.register_identifier(T::TAG, T::parse_text);
    }

    pub fn with_identifier_type(mut self) -> Self {
        self.register_identifier_type();
        self
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bindings: Vec<_> = self.bindings.keys().collect();
        bindings.sort();
        let mut identifiers: Vec<_> = self.identifiers.keys().collect();
        identifiers.sort();

        f.debug_struct("Registry")
            .field("source_kinds", &self.source_kinds.keys().collect::<Vec<_>>())
            .field("bindings", &bindings)
            .field("identifiers", &identifiers)
            .finish()
    }
}

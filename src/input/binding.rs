// Polymorphic binding records stored in the input configuration

use super::{ConfigError, ConfigResult};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::{Debug, Display};
use std::str::FromStr;

/// Field name the snapshot uses for the type tag; records cannot use it
pub const RESERVED_FIELD: &str = "type";

/// Flat string fields making up one serialized binding record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(BTreeMap<String, String>);

impl Fields {
    /// Create an empty field set
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Set a field
    ///
    /// Any name is accepted here; [`Fields::check_names`] rejects the ones a
    /// snapshot cannot hold.
    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        self.0.insert(name.into(), value.to_string());
    }

    /// Get a raw field value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Get a field that must be present, for the record type `tag`
    pub fn require(&self, tag: &str, name: &str) -> ConfigResult<&str> {
        self.get(name).ok_or_else(|| ConfigError::InvalidField {
            tag: tag.to_string(),
            field: name.to_string(),
            reason: "missing".to_string(),
        })
    }

    /// Parse a required field
    pub fn parse<V>(&self, tag: &str, name: &str) -> ConfigResult<V>
    where
        V: FromStr,
        V::Err: Display,
    {
        self.require(tag, name)?
            .parse()
            .map_err(|e: V::Err| ConfigError::InvalidField {
                tag: tag.to_string(),
                field: name.to_string(),
                reason: e.to_string(),
            })
    }

    /// Check every name can be stored as an attribute of a record of type `tag`
    ///
    /// Names must look like `code`, `button_id` or `axis.x`: a letter or `_`
    /// followed by letters, digits, `_`, `-` or `.`. The name `type` is
    /// reserved for the record's tag.
    pub fn check_names(&self, tag: &str) -> ConfigResult<()> {
        for name in self.0.keys() {
            let reason = if name == RESERVED_FIELD {
                "the name is reserved for the type tag"
            } else if !is_field_name(name) {
                "not a valid attribute name"
            } else {
                continue;
            };
            return Err(ConfigError::InvalidField {
                tag: tag.to_string(),
                field: name.clone(),
                reason: reason.to_string(),
            });
        }
        Ok(())
    }

    /// Iterate over fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One physical binding owned by a source, e.g. "key Space sends 32767"
///
/// Stored as `Box<dyn BindingRecord>` so every source can keep its own record
/// type in the shared configuration. Implement [`TypedBinding`] instead of
/// this trait; a blanket impl provides it.
pub trait BindingRecord: Any + Debug + Send + Sync {
    /// Tag naming the concrete record type in snapshots
    fn type_tag(&self) -> &'static str;

    /// Write this record's data
    fn write_fields(&self, fields: &mut Fields) -> ConfigResult<()>;

    fn clone_record(&self) -> Box<dyn BindingRecord>;

    /// Value equality; records of different types are never equal
    fn eq_record(&self, other: &dyn BindingRecord) -> bool;

    fn as_any(&self) -> &dyn Any;
}

/// Concrete binding record types known by tag
pub trait TypedBinding: Any + Debug + Clone + PartialEq + Send + Sync {
    /// Stable tag, unique across all record types in a registry
    const TAG: &'static str;

    /// Write this record's data
    fn to_fields(&self, fields: &mut Fields) -> ConfigResult<()>;

    /// Rebuild a record from the data written by [`TypedBinding::to_fields`]
    fn from_fields(fields: &Fields) -> ConfigResult<Self>;
}

impl<B: TypedBinding> BindingRecord for B {
    fn type_tag(&self) -> &'static str {
        B::TAG
    }

    fn write_fields(&self, fields: &mut Fields) -> ConfigResult<()> {
        self.to_fields(fields)
    }

    fn clone_record(&self) -> Box<dyn BindingRecord> {
        Box::new(self.clone())
    }

    fn eq_record(&self, other: &dyn BindingRecord) -> bool {
        other
            .as_any()
            .downcast_ref::<B>()
            .map_or(false, |other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn BindingRecord {
    /// Get the concrete record if it is a `B`
    pub fn downcast_ref<B: BindingRecord>(&self) -> Option<&B> {
        self.as_any().downcast_ref::<B>()
    }

    /// Check if the concrete record is a `B`
    pub fn is<B: BindingRecord>(&self) -> bool {
        self.as_any().is::<B>()
    }
}

impl PartialEq for dyn BindingRecord {
    fn eq(&self, other: &Self) -> bool {
        self.eq_record(other)
    }
}

impl Clone for Box<dyn BindingRecord> {
    fn clone(&self) -> Self {
        (**self).clone_record()
    }
}

fn is_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    }
}

/// Decode a boxed record of type `B`; stored in the registry by tag
pub(crate) fn decode_boxed<B: TypedBinding>(fields: &Fields) -> ConfigResult<Box<dyn BindingRecord>> {
    Ok(Box::new(B::from_fields(fields)?))
}

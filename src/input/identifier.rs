// Logical input identifiers

use std::fmt::Debug;
use std::hash::Hash;

/// A logical input name such as "jump" or `Action::MoveLeft`
///
/// Identifiers are only ever used as map keys. To survive a save/load cycle
/// each value reports a type tag naming its concrete variant and a text form;
/// the [`Registry`](super::Registry) maps the tag back to a decoder.
pub trait Identifier: Clone + Eq + Hash + Debug + 'static {
    /// Tag naming the concrete type (or enum variant) of this value
    fn type_tag(&self) -> &'static str;

    /// Text form written to the snapshot
    fn to_text(&self) -> String;
}

/// Identifier types with a single tag that can decode their own text form
pub trait ParseIdentifier: Identifier + Sized {
    /// Tag every value of this type reports
    const TAG: &'static str;

    /// Parse the text written by [`Identifier::to_text`]
    fn parse_text(text: &str) -> Result<Self, String>;
}

impl Identifier for String {
    fn type_tag(&self) -> &'static str {
        <Self as ParseIdentifier>::TAG
    }

    fn to_text(&self) -> String {
        self.clone()
    }
}

impl ParseIdentifier for String {
    const TAG: &'static str = "string";

    fn parse_text(text: &str) -> Result<Self, String> {
        Ok(text.to_string())
    }
}

impl Identifier for char {
    fn type_tag(&self) -> &'static str {
        <Self as ParseIdentifier>::TAG
    }

    fn to_text(&self) -> String {
        self.to_string()
    }
}

impl ParseIdentifier for char {
    const TAG: &'static str = "char";

    fn parse_text(text: &str) -> Result<Self, String> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(format!("expected exactly one character, got {:?}", text)),
        }
    }
}

macro_rules! numeric_identifier {
    ($($ty:ty => $tag:literal),* $(,)?) => {
        $(
            impl Identifier for $ty {
                fn type_tag(&self) -> &'static str {
                    <Self as ParseIdentifier>::TAG
                }

                fn to_text(&self) -> String {
                    self.to_string()
                }
            }

            impl ParseIdentifier for $ty {
                const TAG: &'static str = $tag;

                fn parse_text(text: &str) -> Result<Self, String> {
                    text.parse::<$ty>().map_err(|e| e.to_string())
                }
            }
        )*
    };
}

numeric_identifier! {
    i32 => "i32",
    i64 => "i64",
    u32 => "u32",
}

// Input aggregation system
//
// This module collects input from any number of sources (keyboard, gamepads,
// custom devices) for any number of players, and keeps the player's bindings
// in a configuration that can be saved and loaded.
//
// ## Architecture
//
// - `map`: Per-frame aggregated values, largest magnitude wins
// - `binding`: Polymorphic binding records owned by sources
// - `identifier`: Logical input names and their type tags
// - `registry`: Tag -> decoder lookup used when loading
// - `config`: Player/source/identifier -> bindings store
// - `snapshot`: XML form of the store
// - `source`: Source contract and the guarded lifecycle wrapper
// - `manager`: Owns the sources and the store, drives updates and rebinding
// - `keyboard`: Reference keyboard source fed by winit events
//
// ## Usage Example
//
// ```rust
// use polyinput::input::{InputManager, KeyboardSource, KeyboardState, Registry};
//
// let mut registry = Registry::<String>::new().with_identifier_type();
// KeyboardSource::register(&mut registry);
//
// let keyboard = KeyboardState::default();
// let mut manager = InputManager::new(registry);
// let state = keyboard.clone();
// manager.add_source("keyboard", move || KeyboardSource::guarded(state));
// manager.enable("keyboard");
//
// // In the event loop
// keyboard.process_keyboard_event(&key_event);
//
// // Once per frame
// let inputs = manager.update();
// let jump = inputs.get(0, &"jump".to_string());
// ```

pub mod binding;
pub mod config;
pub mod identifier;
pub mod keyboard;
pub mod manager;
pub mod map;
pub mod registry;
pub mod snapshot;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use binding::{BindingRecord, Fields, TypedBinding};
pub use config::{InputConfiguration, SourceBindings, SourceKind};
pub use identifier::{Identifier, ParseIdentifier};
pub use keyboard::{KeyBinding, KeyboardSource, KeyboardState};
pub use manager::InputManager;
pub use map::InputMap;
pub use registry::Registry;
pub use snapshot::ConfigSnapshot;
pub use source::{Guarded, InputSource, SourceBehavior, SourceState};

use std::fmt;

/// Player index; any value is valid, counting up from 0 is conventional
pub type Player = i32;

/// What kind of tag failed to resolve while loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Source,
    Binding,
    Identifier,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeKind::Source => "source",
            TypeKind::Binding => "binding",
            TypeKind::Identifier => "identifier",
        };
        f.write_str(name)
    }
}

/// Input configuration saving/loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid XML attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Malformed input configuration: {0}")]
    Malformed(String),

    #[error("Unknown {kind} type: {tag}")]
    UnknownType { kind: TypeKind, tag: String },

    #[error("Invalid field '{field}' in {tag} binding: {reason}")]
    InvalidField {
        tag: String,
        field: String,
        reason: String,
    },

    #[error("Invalid {tag} identifier {text:?}: {reason}")]
    InvalidIdentifier {
        tag: String,
        text: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

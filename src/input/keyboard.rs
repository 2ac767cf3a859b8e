// Keyboard input source fed by winit key events

use super::{
    ConfigError, ConfigResult, Fields, Guarded, Identifier, InputConfiguration, InputMap, Player,
    Registry, SourceBehavior, SourceKind, TypedBinding,
};
use crate::value::PRESSED;
use log::debug;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// A physical key sending a fixed value while held
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub key: KeyCode,
    pub value: i16,
}

impl KeyBinding {
    pub fn new(key: KeyCode, value: i16) -> Self {
        Self { key, value }
    }

    /// Binding sending [`PRESSED`] while `key` is held
    pub fn pressed(key: KeyCode) -> Self {
        Self::new(key, PRESSED)
    }
}

impl TypedBinding for KeyBinding {
    const TAG: &'static str = "keyboard.key";

    fn to_fields(&self, fields: &mut Fields) -> ConfigResult<()> {
        match serde_json::to_value(self.key).map_err(key_error)? {
            Value::String(name) => fields.insert("key", name),
            other => {
                return Err(key_error(format!("{:?} saved as {} instead of a name", self.key, other)));
            }
        }
        fields.insert("value", self.value);
        Ok(())
    }

    fn from_fields(fields: &Fields) -> ConfigResult<Self> {
        let name = fields.require(Self::TAG, "key")?;
        let key = serde_json::from_value(Value::String(name.to_string())).map_err(key_error)?;

        Ok(Self {
            key,
            value: fields.parse(Self::TAG, "value")?,
        })
    }
}

fn key_error(reason: impl ToString) -> ConfigError {
    ConfigError::InvalidField {
        tag: KeyBinding::TAG.to_string(),
        field: "key".to_string(),
        reason: reason.to_string(),
    }
}

/// Keys currently held, shared between the event loop and the source
///
/// Clones share the same state. Feed window events in with
/// [`process_keyboard_event`](KeyboardState::process_keyboard_event).
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    /// Held keys in press order
    held: Arc<Mutex<Vec<KeyCode>>>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a keyboard event from winit
    pub fn process_keyboard_event(&self, event: &KeyEvent) {
        if event.repeat {
            return;
        }
        if let PhysicalKey::Code(key_code) = event.physical_key {
            match event.state {
                ElementState::Pressed => self.press(key_code),
                ElementState::Released => self.release(key_code),
            }
        }
    }

    pub fn press(&self, key: KeyCode) {
        let mut held = self.lock();
        if !held.contains(&key) {
            held.push(key);
        }
    }

    pub fn release(&self, key: KeyCode) {
        self.lock().retain(|k| *k != key);
    }

    pub fn is_held(&self, key: KeyCode) -> bool {
        self.lock().contains(&key)
    }

    /// Held keys in press order
    pub fn held(&self) -> Vec<KeyCode> {
        self.lock().clone()
    }

    /// Release every key, e.g. when the window loses focus
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<KeyCode>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reference source reading [`KeyBinding`]s against a [`KeyboardState`]
#[derive(Debug)]
pub struct KeyboardSource {
    state: KeyboardState,
    /// Keys held when the baseline was captured
    baseline: HashSet<KeyCode>,
}

impl KeyboardSource {
    pub const KIND: SourceKind = SourceKind::new("keyboard");

    pub fn new(state: KeyboardState) -> Self {
        Self {
            state,
            baseline: HashSet::new(),
        }
    }

    /// Keyboard source wrapped in the enable/disable guard, ready to add
    pub fn guarded(state: KeyboardState) -> Guarded<Self> {
        Guarded::new(Self::new(state))
    }

    /// Register the keyboard source kind and binding type
    pub fn register<T: Identifier>(registry: &mut Registry<T>) {
        registry.register_source_kind(Self::KIND);
        registry.register_binding::<KeyBinding>();
    }

    pub fn state(&self) -> &KeyboardState {
        &self.state
    }
}

impl<T: Identifier> SourceBehavior<T> for KeyboardSource {
    fn name(&self) -> &str {
        "keyboard"
    }

    fn activate(&mut self) -> bool {
        self.baseline.clear();
        true
    }

    fn deactivate(&mut self) -> bool {
        // Held keys belong to the event loop and any other source sharing the state
        self.baseline.clear();
        true
    }

    fn poll(&mut self, map: &mut InputMap<T>, config: &mut InputConfiguration<T>) {
        let held = self.state.held();
        if held.is_empty() {
            return;
        }
        config.for_each_player(Self::KIND, |player, bindings| {
            for (identifier, records) in bindings.iter() {
                for binding in records.iter().filter_map(|r| r.downcast_ref::<KeyBinding>()) {
                    if held.contains(&binding.key) {
                        map.set(player, identifier.clone(), binding.value);
                    }
                }
            }
        });
    }

    fn capture_baseline(&mut self) {
        self.baseline = self.state.held().into_iter().collect();
    }

    fn try_bind(
        &mut self,
        player: Player,
        identifier: &T,
        value: i16,
        config: &mut InputConfiguration<T>,
    ) -> bool {
        let Some(key) = self
            .state
            .held()
            .into_iter()
            .find(|key| !self.baseline.contains(key))
        else {
            return false;
        };

        let binding = KeyBinding::new(key, value);
        let records = config.bindings(player, Self::KIND, identifier.clone());
        let exists = records
            .iter()
            .any(|r| r.downcast_ref::<KeyBinding>() == Some(&binding));
        if !exists {
            records.push(Box::new(binding));
        }
        debug!("Bound {:?} to {:?} for player {}", key, identifier, player);

        // Holding the key must not bind it again on the next request
        self.baseline.insert(key);
        true
    }
}

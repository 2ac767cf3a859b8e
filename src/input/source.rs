// Input source contract and the guarded enable/disable lifecycle

use super::{Identifier, InputConfiguration, InputMap, Player};
use log::{debug, warn};

/// A source of input: keyboard, gamepad, or any custom device
///
/// Sources read the bindings they own from the [`InputConfiguration`] and
/// write values into the [`InputMap`]. Enabling may finish asynchronously, so
/// [`is_enabled`](InputSource::is_enabled) is the last known state rather
/// than a statement about the hardware.
///
/// Wrap a [`SourceBehavior`] in [`Guarded`] instead of implementing this
/// directly; the wrapper keeps disabled sources away from shared state.
pub trait InputSource<T: Identifier> {
    /// Request enabling; returns whether the source is now enabled
    fn enable(&mut self) -> bool;

    /// Request disabling; returns whether the source is now disabled
    fn disable(&mut self) -> bool;

    fn is_enabled(&self) -> bool;

    /// Write current values for every configured binding into `map`
    fn update(&mut self, map: &mut InputMap<T>, config: &mut InputConfiguration<T>);

    /// Remember the current raw readings for a later `set_input`
    fn save_inputs(&mut self);

    /// Bind whatever control changed since `save_inputs` to `identifier`
    ///
    /// Returns true if a control was found and `config` was updated.
    fn set_input(
        &mut self,
        player: Player,
        identifier: &T,
        value: i16,
        config: &mut InputConfiguration<T>,
    ) -> bool;
}

impl<T: Identifier, S: InputSource<T> + ?Sized> InputSource<T> for Box<S> {
    fn enable(&mut self) -> bool {
        (**self).enable()
    }

    fn disable(&mut self) -> bool {
        (**self).disable()
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }

    fn update(&mut self, map: &mut InputMap<T>, config: &mut InputConfiguration<T>) {
        (**self).update(map, config)
    }

    fn save_inputs(&mut self) {
        (**self).save_inputs()
    }

    fn set_input(
        &mut self,
        player: Player,
        identifier: &T,
        value: i16,
        config: &mut InputConfiguration<T>,
    ) -> bool {
        (**self).set_input(player, identifier, value, config)
    }
}

/// Lifecycle state of a guarded source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceState {
    #[default]
    Disabled,
    Enabled,
}

/// Device-specific half of a source, driven by [`Guarded`]
///
/// `poll`, `capture_baseline` and `try_bind` are only ever called while the
/// source is enabled.
pub trait SourceBehavior<T: Identifier> {
    /// Name used in log messages
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Start the device; return false if it could not be started
    fn activate(&mut self) -> bool;

    /// Stop the device; return false if it is still running
    fn deactivate(&mut self) -> bool;

    /// See [`InputSource::update`]
    fn poll(&mut self, map: &mut InputMap<T>, config: &mut InputConfiguration<T>);

    /// See [`InputSource::save_inputs`]
    fn capture_baseline(&mut self);

    /// See [`InputSource::set_input`]
    fn try_bind(
        &mut self,
        player: Player,
        identifier: &T,
        value: i16,
        config: &mut InputConfiguration<T>,
    ) -> bool;
}

/// Two-state wrapper gating a [`SourceBehavior`] behind "is enabled"
#[derive(Debug)]
pub struct Guarded<B> {
    behavior: B,
    state: SourceState,
}

impl<B> Guarded<B> {
    /// Wrap a behavior; sources always start disabled
    pub fn new(behavior: B) -> Self {
        Self {
            behavior,
            state: SourceState::Disabled,
        }
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn inner(&self) -> &B {
        &self.behavior
    }

    pub fn inner_mut(&mut self) -> &mut B {
        &mut self.behavior
    }

    pub fn into_inner(self) -> B {
        self.behavior
    }
}

impl<T: Identifier, B: SourceBehavior<T>> InputSource<T> for Guarded<B> {
    fn enable(&mut self) -> bool {
        if self.state == SourceState::Disabled {
            if self.behavior.activate() {
                debug!("Enabled input source {}", self.behavior.name());
                self.state = SourceState::Enabled;
            } else {
                warn!("Input source {} failed to enable", self.behavior.name());
            }
        }
        self.state == SourceState::Enabled
    }

    fn disable(&mut self) -> bool {
        if self.state == SourceState::Enabled {
            if self.behavior.deactivate() {
                debug!("Disabled input source {}", self.behavior.name());
                self.state = SourceState::Disabled;
            } else {
                warn!("Input source {} failed to disable", self.behavior.name());
            }
        }
        self.state == SourceState::Disabled
    }

    fn is_enabled(&self) -> bool {
        self.state == SourceState::Enabled
    }

    fn update(&mut self, map: &mut InputMap<T>, config: &mut InputConfiguration<T>) {
        if self.state == SourceState::Enabled {
            self.behavior.poll(map, config);
        }
    }

    fn save_inputs(&mut self) {
        if self.state == SourceState::Enabled {
            self.behavior.capture_baseline();
        }
    }

    fn set_input(
        &mut self,
        player: Player,
        identifier: &T,
        value: i16,
        config: &mut InputConfiguration<T>,
    ) -> bool {
        match self.state {
            SourceState::Enabled => self.behavior.try_bind(player, identifier, value, config),
            SourceState::Disabled => false,
        }
    }
}

// polyinput - Multi-source, multi-player input aggregation
//
// Sources (keyboard, gamepads, custom devices) write into one per-frame map
// per update, and every player's bindings live in a single configuration that
// is saved to and loaded from XML without losing the concrete binding types.

pub mod input;
pub mod value;

pub use input::{
    ConfigError, ConfigResult, Identifier, InputConfiguration, InputManager, InputMap,
    InputSource, Player, Registry,
};

// Input manager - Main coordination system for all input sources

use super::{
    ConfigResult, Identifier, InputConfiguration, InputMap, InputSource, Player, Registry,
};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::Path;

/// Main input manager that coordinates all sources for all players
///
/// Sources are kept in registration order. That order is also the
/// arbitration order for rebinding: the first source to claim a
/// [`set_input`](InputManager::set_input) request wins.
pub struct InputManager<T: Identifier> {
    /// Registered sources, by id, in registration order
    sources: Vec<(String, Box<dyn InputSource<T>>)>,

    /// Bindings of every source for every player
    config: InputConfiguration<T>,

    /// Known types for loading configurations
    registry: Registry<T>,
}

impl<T: Identifier> InputManager<T> {
    /// Create an input manager with an empty configuration
    pub fn new(registry: Registry<T>) -> Self {
        Self::with_configuration(registry, InputConfiguration::new())
    }

    /// Create an input manager using an existing configuration
    pub fn with_configuration(registry: Registry<T>, config: InputConfiguration<T>) -> Self {
        Self {
            sources: Vec::new(),
            config,
            registry,
        }
    }

    /// Poll every source and collect this frame's input values
    pub fn update(&mut self) -> InputMap<T> {
        let mut map = InputMap::new();
        for (_, source) in self.sources.iter_mut() {
            source.update(&mut map, &mut self.config);
        }
        map
    }

    /// Snapshot the raw state of the selected sources (all if `only` is None)
    ///
    /// Call this before asking the player to press the control to bind.
    pub fn save_inputs(&mut self, only: Option<&HashSet<String>>) {
        for (_, source) in Self::selected(&mut self.sources, only) {
            source.save_inputs();
        }
    }

    /// Bind whatever control changed since `save_inputs` to `identifier`
    ///
    /// Sources are asked in registration order until one claims the request.
    /// Returns false if none did.
    pub fn set_input(
        &mut self,
        player: Player,
        identifier: &T,
        value: i16,
        only: Option<&HashSet<String>>,
    ) -> bool {
        for (id, source) in Self::selected(&mut self.sources, only) {
            if source.set_input(player, identifier, value, &mut self.config) {
                info!(
                    "Source '{}' bound {:?} for player {}",
                    id, identifier, player
                );
                return true;
            }
        }
        debug!("No source claimed {:?} for player {}", identifier, player);
        false
    }

    /// Register a source under `id`, replacing any source already there
    ///
    /// The previous source is disabled before `build` runs, so two instances
    /// never hold the same device. A replacement keeps the old slot's place
    /// in the arbitration order. New sources start disabled.
    pub fn add_source<S, F>(&mut self, id: impl Into<String>, build: F)
    where
        S: InputSource<T> + 'static,
        F: FnOnce() -> S,
    {
        let id = id.into();
        match self.position(&id) {
            Some(index) => {
                let old = &mut self.sources[index].1;
                if !old.disable() {
                    warn!("Input source '{}' did not confirm disabling before replacement", id);
                }
                self.sources[index].1 = Box::new(build());
                info!("Replaced input source '{}'", id);
            }
            None => {
                let source = Box::new(build());
                info!("Added input source '{}'", id);
                self.sources.push((id, source));
            }
        }
    }

    /// Disable and drop a source; returns false if `id` is unknown
    pub fn remove_source(&mut self, id: &str) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        let (id, mut source) = self.sources.remove(index);
        if !source.disable() {
            warn!("Input source '{}' did not confirm disabling before removal", id);
        }
        info!("Removed input source '{}'", id);
        true
    }

    /// Enable a source; returns whether it is now enabled
    pub fn enable(&mut self, id: &str) -> bool {
        match self.source_mut(id) {
            Some(source) => source.enable(),
            None => false,
        }
    }

    /// Disable a source; returns whether it is now disabled
    pub fn disable(&mut self, id: &str) -> bool {
        match self.source_mut(id) {
            Some(source) => source.disable(),
            None => false,
        }
    }

    /// Check if a source is enabled; false for unknown ids
    pub fn is_enabled(&self, id: &str) -> bool {
        self.sources
            .iter()
            .find(|(source_id, _)| source_id == id)
            .map_or(false, |(_, source)| source.is_enabled())
    }

    /// Enable every source
    pub fn enable_all(&mut self) {
        for (_, source) in self.sources.iter_mut() {
            source.enable();
        }
    }

    /// Disable every source
    pub fn disable_all(&mut self) {
        for (_, source) in self.sources.iter_mut() {
            source.disable();
        }
    }

    /// Remove all bindings of `identifier` for a player
    pub fn clear_input(&mut self, player: Player, identifier: &T) {
        self.config.clear_input(player, identifier);
    }

    /// Remove duplicate bindings
    pub fn clean(&mut self) {
        self.config.clean();
    }

    /// Save the configuration to an XML string
    pub fn save(&self) -> ConfigResult<String> {
        self.config.save_to_string()
    }

    /// Save the configuration as XML to a writer
    pub fn save_to_writer<W: Write>(&self, writer: W) -> ConfigResult<()> {
        self.config.save_to_writer(writer)
    }

    /// Save the configuration as XML to a file
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        self.config.save_to_path(path)
    }

    /// Replace the configuration with one loaded from XML
    ///
    /// On error the current configuration is kept as is.
    pub fn load(&mut self, xml: &str) -> ConfigResult<()> {
        self.config = InputConfiguration::load_from_str(xml, &self.registry)?;
        Ok(())
    }

    /// Replace the configuration with XML read from a reader
    pub fn load_from_reader<R: Read>(&mut self, reader: R) -> ConfigResult<()> {
        self.config = InputConfiguration::load_from_reader(reader, &self.registry)?;
        Ok(())
    }

    /// Replace the configuration with XML read from a file
    pub fn load_from_path<P: AsRef<Path>>(&mut self, path: P) -> ConfigResult<()> {
        self.config = InputConfiguration::load_from_path(path, &self.registry)?;
        Ok(())
    }

    /// Get the configuration
    pub fn configuration(&self) -> &InputConfiguration<T> {
        &self.config
    }

    /// Get mutable configuration
    pub fn configuration_mut(&mut self) -> &mut InputConfiguration<T> {
        &mut self.config
    }

    pub fn registry(&self) -> &Registry<T> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry<T> {
        &mut self.registry
    }

    /// Registered source ids, in arbitration order
    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|(id, _)| id.as_str())
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Get the number of sources
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.sources.iter().position(|(source_id, _)| source_id == id)
    }

    fn source_mut(&mut self, id: &str) -> Option<&mut Box<dyn InputSource<T>>> {
        self.sources
            .iter_mut()
            .find(|(source_id, _)| source_id == id)
            .map(|(_, source)| source)
    }

    fn selected<'a>(
        sources: &'a mut [(String, Box<dyn InputSource<T>>)],
        only: Option<&'a HashSet<String>>,
    ) -> impl Iterator<Item = (&'a str, &'a mut Box<dyn InputSource<T>>)> + 'a {
        sources
            .iter_mut()
            .filter(move |(id, _)| only.map_or(true, |set| set.contains(id)))
            .map(|(id, source)| (id.as_str(), source))
    }
}

impl<T: Identifier> Drop for InputManager<T> {
    fn drop(&mut self) {
        for (id, source) in self.sources.iter_mut() {
            if source.is_enabled() && !source.disable() {
                warn!("Input source '{}' did not confirm disabling on shutdown", id);
            }
        }
    }
}

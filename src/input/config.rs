// Input configuration: which physical controls drive which identifiers

use super::snapshot::{ConfigSnapshot, KeySnapshot, PlayerSnapshot, SourceSnapshot, ValueSnapshot};
use super::{BindingRecord, ConfigError, ConfigResult, Identifier, Player, Registry};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Stable name of a source type, namespacing its bindings
///
/// Two sources may both bind "jump" without seeing each other's records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKind(&'static str);

impl SourceKind {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Bindings of one source kind for one player: identifier -> records
pub type SourceBindings<T> = HashMap<T, Vec<Box<dyn BindingRecord>>>;

/// Stores the bindings of every source for every player
///
/// Lookups never fail: asking for a player or source kind that was never
/// configured creates empty containers, so "unconfigured" and "configured
/// but empty" are the same thing.
#[derive(Debug, Clone, PartialEq)]
pub struct InputConfiguration<T: Identifier> {
    /// player -> source kind -> identifier -> bindings
    players: BTreeMap<Player, BTreeMap<SourceKind, SourceBindings<T>>>,
}

impl<T: Identifier> InputConfiguration<T> {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self {
            players: BTreeMap::new(),
        }
    }

    /// Get the bindings a source kind stores for a player, for reading and writing
    pub fn entries(&mut self, player: Player, kind: SourceKind) -> &mut SourceBindings<T> {
        self.players
            .entry(player)
            .or_default()
            .entry(kind)
            .or_default()
    }

    /// Get the binding list for one identifier, creating it if needed
    pub fn bindings(
        &mut self,
        player: Player,
        kind: SourceKind,
        identifier: T,
    ) -> &mut Vec<Box<dyn BindingRecord>> {
        self.entries(player, kind).entry(identifier).or_default()
    }

    /// Look up a binding list without creating anything
    pub fn get(
        &self,
        player: Player,
        kind: SourceKind,
        identifier: &T,
    ) -> Option<&[Box<dyn BindingRecord>]> {
        self.players
            .get(&player)
            .and_then(|kinds| kinds.get(&kind))
            .and_then(|bindings| bindings.get(identifier))
            .map(Vec::as_slice)
    }

    /// Run `handler` for every configured player, in ascending order
    ///
    /// The handler receives the player's bindings for `kind`, created empty
    /// if the player had none.
    pub fn for_each_player<F>(&mut self, kind: SourceKind, mut handler: F)
    where
        F: FnMut(Player, &mut SourceBindings<T>),
    {
        for (player, kinds) in self.players.iter_mut() {
            handler(*player, kinds.entry(kind).or_default());
        }
    }

    /// Remove an identifier's bindings from every source kind of a player
    pub fn clear_input(&mut self, player: Player, identifier: &T) {
        if let Some(kinds) = self.players.get_mut(&player) {
            for bindings in kinds.values_mut() {
                bindings.remove(identifier);
            }
        }
    }

    /// Remove duplicate bindings
    ///
    /// The first occurrence of each record survives and survivors keep their
    /// order. Identifiers are never removed, even if their list is empty.
    pub fn clean(&mut self) {
        let mut removed = 0;
        for kinds in self.players.values_mut() {
            for bindings in kinds.values_mut() {
                for records in bindings.values_mut() {
                    removed += dedup_records(records);
                }
            }
        }
        if removed > 0 {
            debug!("Removed {} duplicate bindings", removed);
        }
    }

    /// Players with any configuration, in ascending order
    pub fn players(&self) -> impl Iterator<Item = Player> + '_ {
        self.players.keys().copied()
    }

    /// Total number of binding records
    pub fn binding_count(&self) -> usize {
        self.players
            .values()
            .flat_map(|kinds| kinds.values())
            .flat_map(|bindings| bindings.values())
            .map(Vec::len)
            .sum()
    }

    /// Check if there are no binding records at all
    pub fn is_empty(&self) -> bool {
        self.binding_count() == 0
    }

    /// Build the tagged document tree for this configuration
    ///
    /// Players and source kinds are written in ascending order, identifiers
    /// sorted by (type tag, text) and records in list order.
    ///
    /// Fails if a record cannot write its fields.
    pub fn to_snapshot(&self) -> ConfigResult<ConfigSnapshot> {
        let mut players = Vec::with_capacity(self.players.len());
        for (num, kinds) in &self.players {
            let mut sources = Vec::with_capacity(kinds.len());
            for (kind, bindings) in kinds {
                sources.push(SourceSnapshot {
                    kind: kind.as_str().to_string(),
                    keys: key_snapshots(bindings)?,
                });
            }
            players.push(PlayerSnapshot { num: *num, sources });
        }

        Ok(ConfigSnapshot { players })
    }

    /// Rebuild a configuration from a document tree
    ///
    /// All or nothing: any tag the registry cannot resolve fails the load.
    pub fn from_snapshot(
        snapshot: &ConfigSnapshot,
        registry: &Registry<T>,
    ) -> ConfigResult<Self> {
        let mut config = Self::new();

        for player in &snapshot.players {
            let kinds = config.players.entry(player.num).or_default();

            for source in &player.sources {
                let kind = registry.source_kind(&source.kind)?;
                let bindings = kinds.entry(kind).or_default();

                for key in &source.keys {
                    let identifier = registry.decode_identifier(&key.type_tag, &key.name)?;
                    if identifier.type_tag() != key.type_tag {
                        return Err(ConfigError::InvalidIdentifier {
                            tag: key.type_tag.clone(),
                            text: key.name.clone(),
                            reason: format!("decoded as type {}", identifier.type_tag()),
                        });
                    }

                    let records = bindings.entry(identifier).or_default();
                    for value in &key.values {
                        let record = registry.decode_binding(&value.type_tag, &value.fields)?;
                        if record.type_tag() != value.type_tag {
                            return Err(ConfigError::Malformed(format!(
                                "binding tagged {} decoded as {}",
                                value.type_tag,
                                record.type_tag()
                            )));
                        }
                        records.push(record);
                    }
                }
            }
        }

        Ok(config)
    }

    /// Save to an XML string
    pub fn save_to_string(&self) -> ConfigResult<String> {
        self.to_snapshot()?.to_xml()
    }

    /// Save as XML to a writer
    pub fn save_to_writer<W: Write>(&self, writer: W) -> ConfigResult<()> {
        self.to_snapshot()?.write_xml(writer)
    }

    /// Save as XML to a file
    ///
    /// Writes a sibling `.tmp` file first and renames it over `path`, so an
    /// interrupted save leaves the previous file intact. The `.tmp` file is
    /// removed again if the save fails.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        let snapshot = self.to_snapshot()?;
        let tmp = temp_path(path);

        if let Err(err) = write_then_rename(&snapshot, &tmp, path) {
            if let Err(remove_err) = fs::remove_file(&tmp) {
                debug!("Could not remove {}: {}", tmp.display(), remove_err);
            }
            return Err(err);
        }

        info!(
            "Saved {} input bindings to {}",
            self.binding_count(),
            path.display()
        );
        Ok(())
    }

    /// Load from an XML string
    pub fn load_from_str(xml: &str, registry: &Registry<T>) -> ConfigResult<Self> {
        let snapshot = ConfigSnapshot::from_xml(xml)?;
        Self::from_snapshot(&snapshot, registry)
    }

    /// Load XML from a reader
    pub fn load_from_reader<R: Read>(reader: R, registry: &Registry<T>) -> ConfigResult<Self> {
        let snapshot = ConfigSnapshot::read_xml(reader)?;
        Self::from_snapshot(&snapshot, registry)
    }

    /// Load XML from a file
    pub fn load_from_path<P: AsRef<Path>>(path: P, registry: &Registry<T>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let config = Self::load_from_reader(File::open(path)?, registry)?;
        info!(
            "Loaded {} input bindings from {}",
            config.binding_count(),
            path.display()
        );
        Ok(config)
    }
}

impl<T: Identifier> Default for InputConfiguration<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop repeated records, keeping first occurrences in order; returns how many went
fn dedup_records(records: &mut Vec<Box<dyn BindingRecord>>) -> usize {
    let before = records.len();
    let mut kept: Vec<Box<dyn BindingRecord>> = Vec::with_capacity(before);
    for record in records.drain(..) {
        if !kept.contains(&record) {
            kept.push(record);
        }
    }
    *records = kept;
    before - records.len()
}

fn key_snapshots<T: Identifier>(
    bindings: &SourceBindings<T>,
) -> ConfigResult<Vec<KeySnapshot>> {
    let mut keys = Vec::with_capacity(bindings.len());
    for (identifier, records) in bindings {
        keys.push(KeySnapshot {
            type_tag: identifier.type_tag().to_string(),
            name: identifier.to_text(),
            values: records
                .iter()
                .map(|record| ValueSnapshot::from_record(record.as_ref()))
                .collect::<ConfigResult<_>>()?,
        });
    }
    keys.sort_by(|a, b| (&a.type_tag, &a.name).cmp(&(&b.type_tag, &b.name)));
    Ok(keys)
}

fn write_then_rename(snapshot: &ConfigSnapshot, tmp: &Path, path: &Path) -> ConfigResult<()> {
    let mut writer = BufWriter::new(File::create(tmp)?);
    snapshot.write_xml(&mut writer)?;
    writer.flush()?;
    drop(writer);
    fs::rename(tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Fields, TypedBinding};
    use crate::input::test_support::{
        test_registry, AxisBinding, ButtonBinding, MockDevice, TestId, OTHER_KIND,
    };

    const MOCK: SourceKind = MockDevice::KIND;

    fn name(s: &str) -> TestId {
        TestId::Name(s.to_string())
    }

    fn button(code: u32) -> Box<dyn BindingRecord> {
        Box::new(ButtonBinding { code })
    }

    fn axis(code: u32) -> Box<dyn BindingRecord> {
        Box::new(AxisBinding { code })
    }

    #[test]
    fn test_entries_auto_create() {
        let mut config: InputConfiguration<TestId> = InputConfiguration::new();
        assert!(config.entries(3, MOCK).is_empty());
        assert_eq!(config.players().collect::<Vec<_>>(), vec![3]);
        assert!(config.is_empty());
    }

    #[test]
    fn test_entries_are_live() {
        let mut config = InputConfiguration::new();
        config.entries(0, MOCK).insert(name("jump"), vec![button(1)]);
        config.bindings(0, MOCK, name("jump")).push(button(2));

        assert_eq!(config.get(0, MOCK, &name("jump")).map(|r| r.len()), Some(2));
        assert_eq!(config.binding_count(), 2);
    }

    #[test]
    fn test_get_does_not_create() {
        let config: InputConfiguration<TestId> = InputConfiguration::new();
        assert!(config.get(0, MOCK, &name("jump")).is_none());
        assert_eq!(config.players().count(), 0);
    }

    #[test]
    fn test_source_kinds_are_namespaced() {
        let mut config = InputConfiguration::new();
        config.bindings(0, MOCK, name("jump")).push(button(1));
        config.bindings(0, OTHER_KIND, name("jump")).push(axis(1));

        assert_eq!(config.get(0, MOCK, &name("jump")).unwrap()[0].type_tag(), ButtonBinding::TAG);
        assert_eq!(config.get(0, OTHER_KIND, &name("jump")).unwrap()[0].type_tag(), AxisBinding::TAG);
    }

    #[test]
    fn test_for_each_player_materializes_kind() {
        let mut config = InputConfiguration::new();
        config.bindings(2, OTHER_KIND, name("a")).push(axis(1));
        config.bindings(0, MOCK, name("b")).push(button(1));

        let mut seen = Vec::new();
        config.for_each_player(MOCK, |player, bindings| seen.push((player, bindings.len())));

        assert_eq!(seen, vec![(0, 1), (2, 0)]);
        assert!(config.get(2, MOCK, &name("b")).is_none());
        assert!(config.entries(2, MOCK).is_empty());
    }

    #[test]
    fn test_clear_input_removes_from_every_kind() {
        let mut config = InputConfiguration::new();
        config.bindings(0, MOCK, name("X")).push(button(1));
        config.bindings(0, OTHER_KIND, name("X")).push(axis(1));
        config.bindings(0, MOCK, name("Y")).push(button(2));
        config.bindings(1, MOCK, name("X")).push(button(3));

        config.clear_input(0, &name("X"));

        assert!(config.get(0, MOCK, &name("X")).is_none());
        assert!(config.get(0, OTHER_KIND, &name("X")).is_none());
        assert!(config.bindings(0, MOCK, name("X")).is_empty());
        assert_eq!(config.get(0, MOCK, &name("Y")).map(|r| r.len()), Some(1));
        assert_eq!(config.get(1, MOCK, &name("X")).map(|r| r.len()), Some(1));
    }

    #[test]
    fn test_clear_input_unknown_player() {
        let mut config: InputConfiguration<TestId> = InputConfiguration::new();
        config.clear_input(5, &name("X"));
        assert_eq!(config.players().count(), 0);
    }

    #[test]
    fn test_clean_collapses_duplicates() {
        let mut config = InputConfiguration::new();
        let list = config.bindings(0, MOCK, name("X"));
        list.push(button(1));
        list.push(button(2));
        list.push(button(1));
        list.push(axis(1));
        list.push(button(2));

        config.clean();

        let expected = vec![button(1), button(2), axis(1)];
        assert_eq!(config.get(0, MOCK, &name("X")).unwrap(), expected.as_slice());
    }

    #[test]
    fn test_clean_is_idempotent() {
        let mut config = InputConfiguration::new();
        config.bindings(0, MOCK, name("X")).extend([button(1), button(1)]);
        config.bindings(1, OTHER_KIND, name("Y")).extend([axis(4), axis(3), axis(4)]);
        config.bindings(1, OTHER_KIND, name("empty"));

        config.clean();
        let once = config.clone();
        config.clean();

        assert_eq!(config, once);
        assert_eq!(config.get(0, MOCK, &name("X")).map(|r| r.len()), Some(1));
        assert_eq!(config.get(1, OTHER_KIND, &name("empty")).map(|r| r.len()), Some(0));
    }

    #[test]
    fn test_empty_snapshot_round_trip() {
        let config: InputConfiguration<TestId> = InputConfiguration::new();
        let snapshot = config.to_snapshot().unwrap();
        assert!(snapshot.players.is_empty());

        let loaded = InputConfiguration::from_snapshot(&snapshot, &test_registry()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_snapshot_preserves_types() {
        let mut config = InputConfiguration::new();
        config.bindings(0, MOCK, name("5")).extend([button(7), axis(7), button(7)]);
        config.bindings(0, MOCK, TestId::Slot(5)).push(axis(1));
        config.bindings(4, OTHER_KIND, name("fire"));

        let snapshot = config.to_snapshot().unwrap();
        let loaded = InputConfiguration::from_snapshot(&snapshot, &test_registry()).unwrap();

        assert_eq!(loaded, config);
        let records = loaded.get(0, MOCK, &name("5")).unwrap();
        assert!(records[0].is::<ButtonBinding>());
        assert!(records[1].is::<AxisBinding>());
        assert!(records[2].is::<ButtonBinding>());
        assert!(loaded.get(0, MOCK, &TestId::Slot(5)).unwrap()[0].is::<AxisBinding>());
    }

    #[test]
    fn test_snapshot_key_order_is_stable() {
        let mut config = InputConfiguration::new();
        config.bindings(0, MOCK, name("b")).push(button(1));
        config.bindings(0, MOCK, TestId::Slot(1)).push(button(1));
        config.bindings(0, MOCK, name("a")).push(button(1));

        let snapshot = config.to_snapshot().unwrap();
        let keys: Vec<_> = snapshot.players[0].sources[0]
            .keys
            .iter()
            .map(|k| (k.type_tag.as_str(), k.name.as_str()))
            .collect();
        assert_eq!(keys, vec![("test.name", "a"), ("test.name", "b"), ("test.slot", "1")]);
    }

    #[test]
    fn test_from_snapshot_unknown_kind_fails() {
        let mut config = InputConfiguration::new();
        config.bindings(0, MOCK, name("jump")).push(button(1));
        let mut snapshot = config.to_snapshot().unwrap();
        snapshot.players[0].sources[0].kind = "joystick".to_string();

        let err = InputConfiguration::from_snapshot(&snapshot, &test_registry()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownType { .. }));
    }

    #[test]
    fn test_from_snapshot_unknown_binding_fails() {
        let mut config = InputConfiguration::new();
        config.bindings(0, MOCK, name("jump")).push(button(1));
        let mut snapshot = config.to_snapshot().unwrap();
        snapshot.players[0].sources[0].keys[0].values[0].type_tag = "test.wheel".to_string();

        let err = InputConfiguration::from_snapshot(&snapshot, &test_registry()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownType { ref tag, .. } if tag == "test.wheel"));
    }

    #[test]
    fn test_xml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings.xml");

        let mut config = InputConfiguration::new();
        config.bindings(0, MOCK, name("jump")).push(button(32));
        config.bindings(1, OTHER_KIND, TestId::Slot(2)).push(axis(1));

        config.save_to_path(&path).unwrap();
        assert!(!temp_path(&path).exists());

        let loaded = InputConfiguration::load_from_path(&path, &test_registry()).unwrap();
        assert_eq!(loaded, config);
    }

    /// Record whose field name cannot be an XML attribute
    #[derive(Debug, Clone, PartialEq)]
    struct SpacedBinding;

    impl TypedBinding for SpacedBinding {
        const TAG: &'static str = "test.spaced";

        fn to_fields(&self, fields: &mut Fields) -> ConfigResult<()> {
            fields.insert("button id", 3);
            Ok(())
        }

        fn from_fields(_fields: &Fields) -> ConfigResult<Self> {
            Ok(Self)
        }
    }

    #[test]
    fn test_save_rejects_unstorable_field_name() {
        let mut config = InputConfiguration::new();
        config.bindings(0, MOCK, name("jump")).push(button(1));
        config.bindings(1, MOCK, name("fire")).push(Box::new(SpacedBinding));

        let err = config.save_to_string().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { ref field, .. } if field == "button id"));
    }

    #[test]
    fn test_failed_save_to_path_leaves_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings.xml");

        let mut good = InputConfiguration::new();
        good.bindings(0, MOCK, name("jump")).push(button(1));
        good.save_to_path(&path).unwrap();

        let mut bad = good.clone();
        bad.bindings(0, MOCK, name("fire")).push(Box::new(SpacedBinding));
        assert!(bad.save_to_path(&path).is_err());

        assert!(!temp_path(&path).exists());
        let loaded = InputConfiguration::load_from_path(&path, &test_registry()).unwrap();
        assert_eq!(loaded, good);
    }

    #[test]
    fn test_failed_write_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings.xml");
        let tmp = temp_path(&path);

        let mut snapshot = ConfigSnapshot::default();
        snapshot.players.push(PlayerSnapshot {
            num: 0,
            sources: Vec::new(),
        });
        let mut fields = Fields::new();
        fields.insert("type", "clash");
        snapshot.players[0].sources.push(SourceSnapshot {
            kind: "mock".to_string(),
            keys: vec![KeySnapshot {
                type_tag: "test.name".to_string(),
                name: "jump".to_string(),
                values: vec![ValueSnapshot {
                    type_tag: "test.button".to_string(),
                    fields,
                }],
            }],
        });

        assert!(write_then_rename(&snapshot, &tmp, &path).is_err());
        assert!(tmp.exists());

        // save_to_path cleans up what write_then_rename leaves behind
        let mut config = InputConfiguration::new();
        config.bindings(0, MOCK, name("fire")).push(Box::new(SpacedBinding));
        assert!(config.save_to_path(&path).is_err());
        assert!(!tmp.exists());
        assert!(!path.exists());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = InputConfiguration::load_from_path(dir.path().join("nope.xml"), &test_registry())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}

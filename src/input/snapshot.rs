// Tagged document tree of an input configuration and its XML form
//
// <InputConfiguration>
//   <player num="0">
//     <configs for="keyboard">
//       <key type="string" name="jump">
//         <value type="keyboard.key" key="Space" value="32767"/>
//       </key>
//     </configs>
//   </player>
// </InputConfiguration>

use super::binding::RESERVED_FIELD;
use super::{BindingRecord, ConfigError, ConfigResult, Fields, Player};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::{ErrorKind, Read, Write};

const ROOT: &str = "InputConfiguration";
const PLAYER: &str = "player";
const SOURCE: &str = "configs";
const KEY: &str = "key";
const VALUE: &str = "value";

/// Whole configuration, every entry carrying its type tag
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSnapshot {
    pub players: Vec<PlayerSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerSnapshot {
    pub num: Player,
    pub sources: Vec<SourceSnapshot>,
}

/// Bindings of one source kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSnapshot {
    pub kind: String,
    pub keys: Vec<KeySnapshot>,
}

/// One identifier and its binding records, in list order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeySnapshot {
    pub type_tag: String,
    pub name: String,
    pub values: Vec<ValueSnapshot>,
}

/// One binding record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueSnapshot {
    pub type_tag: String,
    pub fields: Fields,
}

impl ValueSnapshot {
    pub fn from_record(record: &dyn BindingRecord) -> ConfigResult<Self> {
        let mut fields = Fields::new();
        record.write_fields(&mut fields)?;
        Ok(Self {
            type_tag: record.type_tag().to_string(),
            fields,
        })
    }
}

impl ConfigSnapshot {
    /// Render as an XML document
    pub fn to_xml(&self) -> ConfigResult<String> {
        let mut buffer = Vec::new();
        self.write_xml(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ConfigError::Malformed(e.to_string()))
    }

    /// Write as an XML document
    ///
    /// Nothing is written if a record has a field name the document cannot
    /// hold.
    pub fn write_xml<W: Write>(&self, writer: W) -> ConfigResult<()> {
        self.check_field_names()?;

        let mut writer = Writer::new_with_indent(writer, b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        writer.write_event(Event::Start(BytesStart::new(ROOT)))?;
        for player in &self.players {
            let num = player.num.to_string();
            let mut start = BytesStart::new(PLAYER);
            start.push_attribute(("num", num.as_str()));
            write_container(&mut writer, start, player.sources.is_empty())?;

            for source in &player.sources {
                let mut start = BytesStart::new(SOURCE);
                start.push_attribute(("for", source.kind.as_str()));
                write_container(&mut writer, start, source.keys.is_empty())?;

                for key in &source.keys {
                    let mut start = BytesStart::new(KEY);
                    start.push_attribute(("type", key.type_tag.as_str()));
                    start.push_attribute(("name", key.name.as_str()));
                    write_container(&mut writer, start, key.values.is_empty())?;

                    for value in &key.values {
                        let mut start = BytesStart::new(VALUE);
                        start.push_attribute((RESERVED_FIELD, value.type_tag.as_str()));
                        for (name, field) in value.fields.iter() {
                            start.push_attribute((name, field));
                        }
                        writer.write_event(Event::Empty(start))?;
                    }

                    close_container(&mut writer, KEY, key.values.is_empty())?;
                }

                close_container(&mut writer, SOURCE, source.keys.is_empty())?;
            }

            close_container(&mut writer, PLAYER, player.sources.is_empty())?;
        }
        writer.write_event(Event::End(BytesEnd::new(ROOT)))?;

        Ok(())
    }

    /// Parse an XML document
    ///
    /// Fails on anything that is not exactly the expected element structure.
    pub fn from_xml(xml: &str) -> ConfigResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut parser = Parser::default();
        loop {
            match reader.read_event()? {
                Event::Start(element) => parser.open(&element, false)?,
                Event::Empty(element) => parser.open(&element, true)?,
                Event::End(_) => parser.close(),
                Event::Text(text) => {
                    if !text.iter().all(u8::is_ascii_whitespace) {
                        return Err(ConfigError::Malformed("unexpected text content".to_string()));
                    }
                }
                Event::CData(_) => {
                    return Err(ConfigError::Malformed("unexpected CDATA section".to_string()));
                }
                Event::Eof => break,
                // Declaration, comments, processing instructions, doctype
                _ => {}
            }
        }

        parser.finish()
    }

    /// Parse an XML document from a reader
    pub fn read_xml<R: Read>(mut reader: R) -> ConfigResult<Self> {
        let mut xml = String::new();
        reader.read_to_string(&mut xml).map_err(|e| match e.kind() {
            ErrorKind::InvalidData => {
                ConfigError::Malformed(format!("document is not UTF-8: {}", e))
            }
            _ => ConfigError::Io(e),
        })?;
        Self::from_xml(&xml)
    }

    fn check_field_names(&self) -> ConfigResult<()> {
        let values = self
            .players
            .iter()
            .flat_map(|player| &player.sources)
            .flat_map(|source| &source.keys)
            .flat_map(|key| &key.values);
        for value in values {
            value.fields.check_names(&value.type_tag)?;
        }
        Ok(())
    }
}

fn write_container<W: Write>(
    writer: &mut Writer<W>,
    start: BytesStart<'_>,
    empty: bool,
) -> ConfigResult<()> {
    if empty {
        writer.write_event(Event::Empty(start))?;
    } else {
        writer.write_event(Event::Start(start))?;
    }
    Ok(())
}

fn close_container<W: Write>(writer: &mut Writer<W>, name: &str, empty: bool) -> ConfigResult<()> {
    if !empty {
        writer.write_event(Event::End(BytesEnd::new(name)))?;
    }
    Ok(())
}

/// Element currently open while parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Root,
    Player,
    Source,
    Key,
    Value,
}

#[derive(Debug, Default)]
struct Parser {
    snapshot: ConfigSnapshot,
    stack: Vec<Level>,
    seen_root: bool,
}

impl Parser {
    fn open(&mut self, element: &BytesStart<'_>, empty: bool) -> ConfigResult<()> {
        let qname = element.name();
        let name = qname.as_ref();

        let level = match (self.stack.last().copied(), name) {
            (None, n) if n == ROOT.as_bytes() && !self.seen_root => {
                self.seen_root = true;
                Level::Root
            }
            (Some(Level::Root), n) if n == PLAYER.as_bytes() => {
                let attrs = read_attributes(element)?;
                let num = required(&attrs, PLAYER, "num")?;
                let num = num.parse::<Player>().map_err(|e| {
                    ConfigError::Malformed(format!("invalid player number {:?}: {}", num, e))
                })?;
                self.snapshot.players.push(PlayerSnapshot {
                    num,
                    sources: Vec::new(),
                });
                Level::Player
            }
            (Some(Level::Player), n) if n == SOURCE.as_bytes() => {
                let attrs = read_attributes(element)?;
                let kind = required(&attrs, SOURCE, "for")?.to_string();
                self.current_player()?.sources.push(SourceSnapshot {
                    kind,
                    keys: Vec::new(),
                });
                Level::Source
            }
            (Some(Level::Source), n) if n == KEY.as_bytes() => {
                let attrs = read_attributes(element)?;
                let key = KeySnapshot {
                    type_tag: required(&attrs, KEY, "type")?.to_string(),
                    name: required(&attrs, KEY, "name")?.to_string(),
                    values: Vec::new(),
                };
                self.current_source()?.keys.push(key);
                Level::Key
            }
            (Some(Level::Key), n) if n == VALUE.as_bytes() => {
                let mut type_tag = None;
                let mut fields = Fields::new();
                for (attr, value) in read_attributes(element)? {
                    if attr == RESERVED_FIELD {
                        type_tag = Some(value);
                    } else {
                        fields.insert(attr, value);
                    }
                }
                let type_tag = type_tag.ok_or_else(|| missing(VALUE, RESERVED_FIELD))?;
                self.current_key()?.values.push(ValueSnapshot { type_tag, fields });
                Level::Value
            }
            _ => {
                return Err(ConfigError::Malformed(format!(
                    "unexpected element <{}>",
                    String::from_utf8_lossy(name)
                )));
            }
        };

        if !empty {
            self.stack.push(level);
        }
        Ok(())
    }

    fn close(&mut self) {
        // The reader already rejects mismatched end tags
        self.stack.pop();
    }

    fn finish(self) -> ConfigResult<ConfigSnapshot> {
        if !self.seen_root {
            return Err(ConfigError::Malformed(format!("missing <{}> root element", ROOT)));
        }
        if !self.stack.is_empty() {
            return Err(ConfigError::Malformed("unexpected end of document".to_string()));
        }
        Ok(self.snapshot)
    }

    fn current_player(&mut self) -> ConfigResult<&mut PlayerSnapshot> {
        self.snapshot
            .players
            .last_mut()
            .ok_or_else(|| ConfigError::Malformed("configs outside of a player".to_string()))
    }

    fn current_source(&mut self) -> ConfigResult<&mut SourceSnapshot> {
        self.current_player()?
            .sources
            .last_mut()
            .ok_or_else(|| ConfigError::Malformed("key outside of configs".to_string()))
    }

    fn current_key(&mut self) -> ConfigResult<&mut KeySnapshot> {
        self.current_source()?
            .keys
            .last_mut()
            .ok_or_else(|| ConfigError::Malformed("value outside of a key".to_string()))
    }
}

/// Unescaped attributes of an element, in document order
fn read_attributes(element: &BytesStart<'_>) -> ConfigResult<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for attr in element.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok(attrs)
}

fn required<'a>(attrs: &'a [(String, String)], element: &str, name: &str) -> ConfigResult<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
        .ok_or_else(|| missing(element, name))
}

fn missing(element: &str, attr: &str) -> ConfigError {
    ConfigError::Malformed(format!("<{}> is missing the '{}' attribute", element, attr))
}

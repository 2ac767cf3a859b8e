// Fixtures shared by the input unit tests

use super::{
    ConfigResult, Fields, Identifier, InputConfiguration, InputMap, Player, Registry,
    SourceBehavior, SourceKind, TypedBinding,
};
use crate::value::PRESSED;
use std::cell::RefCell;
use std::rc::Rc;

/// Second source kind for namespace tests
pub const OTHER_KIND: SourceKind = SourceKind::new("other");

#[derive(Debug, Clone, PartialEq)]
pub struct ButtonBinding {
    pub code: u32,
}

impl TypedBinding for ButtonBinding {
    const TAG: &'static str = "test.button";

    fn to_fields(&self, fields: &mut Fields) -> ConfigResult<()> {
        fields.insert("code", self.code);
        Ok(())
    }

    fn from_fields(fields: &Fields) -> ConfigResult<Self> {
        Ok(Self {
            code: fields.parse(Self::TAG, "code")?,
        })
    }
}

/// Same layout as `ButtonBinding`, different type
#[derive(Debug, Clone, PartialEq)]
pub struct AxisBinding {
    pub code: u32,
}

impl TypedBinding for AxisBinding {
    const TAG: &'static str = "test.axis";

    fn to_fields(&self, fields: &mut Fields) -> ConfigResult<()> {
        fields.insert("code", self.code);
        Ok(())
    }

    fn from_fields(fields: &Fields) -> ConfigResult<Self> {
        Ok(Self {
            code: fields.parse(Self::TAG, "code")?,
        })
    }
}

/// Identifier whose variants carry different type tags
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TestId {
    Name(String),
    Slot(i32),
}

impl Identifier for TestId {
    fn type_tag(&self) -> &'static str {
        match self {
            TestId::Name(_) => "test.name",
            TestId::Slot(_) => "test.slot",
        }
    }

    fn to_text(&self) -> String {
        match self {
            TestId::Name(name) => name.clone(),
            TestId::Slot(slot) => slot.to_string(),
        }
    }
}

pub fn test_registry() -> Registry<TestId> {
    Registry::new()
        .with_source_kind(MockDevice::KIND)
        .with_source_kind(OTHER_KIND)
        .with_binding::<ButtonBinding>()
        .with_binding::<AxisBinding>()
        .with_identifier("test.name", |text| Ok(TestId::Name(text.to_string())))
        .with_identifier("test.slot", |text| {
            text.parse().map(TestId::Slot).map_err(|e| format!("{}", e))
        })
}

pub fn string_registry() -> Registry<String> {
    Registry::new()
        .with_source_kind(MockDevice::KIND)
        .with_source_kind(OTHER_KIND)
        .with_binding::<ButtonBinding>()
        .with_binding::<AxisBinding>()
        .with_identifier_type()
}

/// Ordered record of calls made on mock devices and builders
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.borrow_mut().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.0.borrow().iter().filter(|c| *c == call).count()
    }

    pub fn position(&self, call: &str) -> Option<usize> {
        self.0.borrow().iter().position(|c| c == call)
    }
}

/// Scriptable device holding at most one button
#[derive(Debug)]
pub struct MockDevice {
    label: &'static str,
    log: CallLog,
    pub activate_ok: bool,
    pub deactivate_ok: bool,
    /// Button currently held
    pub held: Option<u32>,
    /// Whether `try_bind` claims the held button
    pub claims: bool,
}

impl MockDevice {
    pub const KIND: SourceKind = SourceKind::new("mock");

    pub fn new(label: &'static str, log: CallLog) -> Self {
        Self {
            label,
            log,
            activate_ok: true,
            deactivate_ok: true,
            held: None,
            claims: false,
        }
    }

    fn record(&self, call: &str) {
        self.log.push(format!("{}.{}", self.label, call));
    }
}

impl SourceBehavior<String> for MockDevice {
    fn name(&self) -> &str {
        self.label
    }

    fn activate(&mut self) -> bool {
        self.record("activate");
        self.activate_ok
    }

    fn deactivate(&mut self) -> bool {
        self.record("deactivate");
        self.deactivate_ok
    }

    fn poll(&mut self, map: &mut InputMap<String>, config: &mut InputConfiguration<String>) {
        self.record("poll");
        let Some(held) = self.held else {
            return;
        };
        config.for_each_player(Self::KIND, |player, bindings| {
            for (identifier, records) in bindings.iter() {
                let bound = records
                    .iter()
                    .filter_map(|r| r.downcast_ref::<ButtonBinding>())
                    .any(|b| b.code == held);
                if bound {
                    map.set(player, identifier.clone(), PRESSED);
                }
            }
        });
    }

    fn capture_baseline(&mut self) {
        self.record("save");
    }

    fn try_bind(
        &mut self,
        player: Player,
        identifier: &String,
        _value: i16,
        config: &mut InputConfiguration<String>,
    ) -> bool {
        self.record("bind");
        match (self.claims, self.held) {
            (true, Some(code)) => {
                config
                    .bindings(player, Self::KIND, identifier.clone())
                    .push(Box::new(ButtonBinding { code }));
                true
            }
            _ => false,
        }
    }
}

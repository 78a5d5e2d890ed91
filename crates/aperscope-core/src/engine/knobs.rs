use crate::core::lattice::handle::LineHandle;
use crate::core::models::beam::BeamPair;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnobValue {
    pub current: f64,
    pub initial: f64,
}

/// Current and as-loaded value of every knob of both lines.
///
/// Knobs shared by both lines appear once; their initial value is the one of
/// the beam-1 line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnobState {
    values: BTreeMap<String, KnobValue>,
}

impl KnobState {
    pub fn from_lines<L: LineHandle>(lines: &BeamPair<L>) -> Self {
        let mut values = BTreeMap::new();
        for (_, line) in lines.iter() {
            for name in line.knobs() {
                if values.contains_key(&name) {
                    continue;
                }
                if let Some(value) = line.var(&name) {
                    values.insert(
                        name,
                        KnobValue {
                            current: value,
                            initial: value,
                        },
                    );
                }
            }
        }
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&KnobValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn set_current(&mut self, name: &str, value: f64) {
        if let Some(knob) = self.values.get_mut(name) {
            knob.current = value;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KnobValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Knobs whose current value differs from the initial one.
    pub fn modified(&self) -> impl Iterator<Item = (&str, &KnobValue)> {
        self.iter().filter(|(_, v)| v.current != v.initial)
    }
}

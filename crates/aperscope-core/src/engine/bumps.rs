use super::error::EngineError;
use super::model::OpticsModel;
use crate::core::lattice::handle::LineHandle;
use crate::core::models::beam::Beam;
use slotmap::{SlotMap, new_key_type};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

new_key_type! {
    pub struct BumpId;
}

/// A named orbit bump: a set of correctors of one beam and the kick each
/// contributes per unit of amplitude, in microradians.
#[derive(Debug, Clone, PartialEq)]
pub struct Bump {
    pub name: String,
    pub beam: Beam,
    pub correctors: Vec<(String, f64)>,
}

/// Per-corrector knob deltas, keyed by beam and corrector knob.
pub type KnobDeltas = BTreeMap<(Beam, String), f64>;

/// Collection of bumps addressable by name.
///
/// Applying a bump only writes corrector knobs; the model has to be twissed
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct BumpRegistry {
    bumps: SlotMap<BumpId, Bump>,
    by_name: HashMap<String, BumpId>,
}

impl BumpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines an empty bump.
    ///
    /// # Arguments
    ///
    /// * `name` - Unique name of the bump.
    /// * `beam` - Beam whose correctors the bump drives.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Domain`] if a bump with the same name exists.
    pub fn define(&mut self, name: &str, beam: Beam) -> Result<BumpId, EngineError> {
        if self.by_name.contains_key(name) {
            return Err(EngineError::Domain(format!(
                "bump '{}' is already defined",
                name
            )));
        }
        let id = self.bumps.insert(Bump {
            name: name.to_string(),
            beam,
            correctors: Vec::new(),
        });
        self.by_name.insert(name.to_string(), id);
        debug!(bump = name, %beam, "Bump defined.");
        Ok(id)
    }

    /// Adds `corrector` to `bump`, or replaces its kick when already present.
    ///
    /// # Arguments
    ///
    /// * `bump` - Name of a defined bump.
    /// * `corrector` - Corrector knob name.
    /// * `kick_per_unit` - Kick in microradians per unit of amplitude.
    pub fn add_corrector(
        &mut self,
        bump: &str,
        corrector: &str,
        kick_per_unit: f64,
    ) -> Result<(), EngineError> {
        if !kick_per_unit.is_finite() {
            return Err(EngineError::Domain(format!(
                "kick of '{}' must be finite, got {}",
                corrector, kick_per_unit
            )));
        }
        let entry = self.get_mut(bump)?;
        match entry.correctors.iter_mut().find(|(c, _)| c == corrector) {
            Some((_, kick)) => *kick = kick_per_unit,
            None => entry
                .correctors
                .push((corrector.to_string(), kick_per_unit)),
        }
        Ok(())
    }

    pub fn remove_corrector(&mut self, bump: &str, corrector: &str) -> Result<(), EngineError> {
        let entry = self.get_mut(bump)?;
        let before = entry.correctors.len();
        entry.correctors.retain(|(c, _)| c != corrector);
        if entry.correctors.len() == before {
            return Err(EngineError::Domain(format!(
                "corrector '{}' is not part of bump '{}'",
                corrector, bump
            )));
        }
        Ok(())
    }

    pub fn remove(&mut self, bump: &str) -> Result<Bump, EngineError> {
        let id = self.by_name.remove(bump).ok_or_else(|| unknown(bump))?;
        self.bumps.remove(id).ok_or_else(|| {
            EngineError::Internal(format!("bump '{}' indexed but not stored", bump))
        })
    }

    pub fn remove_all(&mut self) {
        self.bumps.clear();
        self.by_name.clear();
    }

    pub fn id(&self, name: &str) -> Option<BumpId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Bump> {
        self.id(name).and_then(|id| self.bumps.get(id))
    }

    pub fn bump(&self, id: BumpId) -> Option<&Bump> {
        self.bumps.get(id)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Bump, EngineError> {
        let id = self.id(name).ok_or_else(|| unknown(name))?;
        self.bumps.get_mut(id).ok_or_else(|| unknown(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (BumpId, &Bump)> {
        self.bumps.iter()
    }

    pub fn len(&self) -> usize {
        self.bumps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bumps.is_empty()
    }

    /// Sums the knob deltas of `entries` (bump name, amplitude) per corrector.
    pub fn contributions(&self, entries: &[(&str, f64)]) -> Result<KnobDeltas, EngineError> {
        let mut deltas = KnobDeltas::new();
        for &(name, amplitude) in entries {
            let bump = self.get(name).ok_or_else(|| unknown(name))?;
            for (corrector, kick) in &bump.correctors {
                *deltas.entry((bump.beam, corrector.clone())).or_insert(0.0) +=
                    kick * amplitude * 1e-6;
            }
        }
        Ok(deltas)
    }

    /// Adds `amplitude` units of `bump` to the current corrector strengths.
    pub fn apply<L: LineHandle>(
        &self,
        model: &mut OpticsModel<L>,
        bump: &str,
        amplitude: f64,
    ) -> Result<(), EngineError> {
        self.apply_many(model, &[(bump, amplitude)])
    }

    /// Adds several bumps at once; contributions to a shared corrector are
    /// summed and written once.
    pub fn apply_many<L: LineHandle>(
        &self,
        model: &mut OpticsModel<L>,
        entries: &[(&str, f64)],
    ) -> Result<(), EngineError> {
        let deltas = self.contributions(entries)?;
        for ((beam, corrector), delta) in deltas {
            let current = model.line(beam).var(&corrector).ok_or_else(|| {
                EngineError::Domain(format!("unknown corrector '{}' on {}", corrector, beam))
            })?;
            model.change_acb_knob(&corrector, current + delta, beam)?;
        }
        debug!(bumps = entries.len(), "Bumps applied.");
        Ok(())
    }
}

fn unknown(name: &str) -> EngineError {
    EngineError::Domain(format!("unknown bump '{}'", name))
}

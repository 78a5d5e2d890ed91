use super::expr::LinearExpr;
use super::handle::{
    LineHandle, MatchOutcome, MatchRequest, OracleError, TwissOptions, TwissTable,
};
use super::matching;
use super::twiss::{self, ResolvedElement};
use crate::core::io::line::{ElementKind, LineError, LineFile};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct ThinElement {
    pub name: String,
    pub s: f64,
    pub length: f64,
    pub kind: ElementKind,
    pub k1l: LinearExpr,
    pub angle: f64,
    pub hkick: LinearExpr,
    pub vkick: LinearExpr,
}

impl ThinElement {
    fn expressions(&self) -> [&LinearExpr; 3] {
        [&self.k1l, &self.hkick, &self.vkick]
    }

    fn depends_on(&self, var: &str) -> bool {
        self.expressions().iter().any(|e| e.depends_on(var))
    }
}

/// A ring of thin elements whose strengths are linear in the knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    name: String,
    length: f64,
    gamma0: f64,
    vars: HashMap<String, f64>,
    elements: Vec<ThinElement>,
}

impl Lattice {
    pub fn open(path: &Path) -> Result<Self, LineError> {
        let file = LineFile::load(path)?;
        let lattice = Self::from_file(file)?;
        debug!(
            path = %path.display(),
            elements = lattice.elements.len(),
            knobs = lattice.vars.len(),
            "Opened line"
        );
        Ok(lattice)
    }

    pub fn from_file(file: LineFile) -> Result<Self, LineError> {
        let gamma0 = file.particle.gamma0()?;
        if file.elements.is_empty() {
            return Err(LineError::Invalid("line has no elements".to_string()));
        }

        let mut elements: Vec<ThinElement> = file
            .elements
            .into_iter()
            .map(|spec| ThinElement {
                name: spec.name.to_ascii_lowercase(),
                s: spec.s,
                length: spec.length,
                kind: spec.kind,
                k1l: spec.k1l,
                angle: spec.angle,
                hkick: spec.hkick,
                vkick: spec.vkick,
            })
            .collect();
        elements.sort_by(|a, b| a.s.total_cmp(&b.s));

        let length = match file.length {
            Some(l) => l,
            None => elements
                .iter()
                .map(|e| e.s + e.length)
                .fold(f64::NEG_INFINITY, f64::max),
        };
        if !length.is_finite() || length <= 0.0 {
            return Err(LineError::Invalid(format!(
                "ring length must be positive (got {})",
                length
            )));
        }
        if let Some(e) = elements
            .iter()
            .find(|e| !e.s.is_finite() || e.s < 0.0 || e.s >= length)
        {
            return Err(LineError::Invalid(format!(
                "element '{}' at s = {} lies outside [0, {})",
                e.name, e.s, length
            )));
        }

        let vars: HashMap<String, f64> = file.vars.into_iter().collect();
        for element in &elements {
            for expr in element.expressions() {
                if let Some(var) = expr.variables().find(|v| !vars.contains_key(*v)) {
                    return Err(LineError::Invalid(format!(
                        "element '{}' refers to undefined variable '{}'",
                        element.name, var
                    )));
                }
            }
        }

        Ok(Self {
            name: file.name,
            length,
            gamma0,
            vars,
            elements,
        })
    }

    pub fn elements(&self) -> &[ThinElement] {
        &self.elements
    }
}

impl LineHandle for Lattice {
    fn name(&self) -> &str {
        &self.name
    }

    fn twiss(&self, options: &TwissOptions) -> Result<TwissTable, OracleError> {
        let resolved: Vec<ResolvedElement> = self
            .elements
            .iter()
            .map(|e| ResolvedElement {
                name: &e.name,
                s: e.s,
                k1l: e.k1l.eval(&self.vars),
                hkick: e.hkick.eval(&self.vars),
                vkick: e.vkick.eval(&self.vars),
                angle: e.angle,
            })
            .collect();
        twiss::compute(&resolved, self.length, options)
    }

    fn var(&self, name: &str) -> Option<f64> {
        self.vars.get(name).copied()
    }

    fn set_var(&mut self, name: &str, value: f64) -> Result<(), OracleError> {
        if !value.is_finite() {
            return Err(OracleError::NonFinite {
                name: name.to_string(),
                value,
            });
        }
        let slot = self
            .vars
            .get_mut(name)
            .ok_or_else(|| OracleError::UnknownVariable(name.to_string()))?;
        *slot = value;
        Ok(())
    }

    fn knobs(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vars.keys().cloned().collect();
        names.sort();
        names
    }

    fn dependent_elements(&self, knob: &str) -> Vec<String> {
        self.elements
            .iter()
            .filter(|e| e.depends_on(knob))
            .map(|e| e.name.clone())
            .collect()
    }

    fn gamma0(&self) -> f64 {
        self.gamma0
    }

    fn length(&self) -> f64 {
        self.length
    }

    fn match_targets(&mut self, request: &MatchRequest) -> Result<MatchOutcome, OracleError> {
        matching::newton_match(self, request)
    }
}

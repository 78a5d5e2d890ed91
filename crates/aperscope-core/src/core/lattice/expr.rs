use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// A strength written as `constant + Σ coeff · var`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawExpr")]
pub struct LinearExpr {
    pub constant: f64,
    pub terms: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawExpr {
    Number(f64),
    Linear {
        #[serde(default)]
        constant: f64,
        #[serde(default)]
        terms: BTreeMap<String, f64>,
    },
}

impl From<RawExpr> for LinearExpr {
    fn from(raw: RawExpr) -> Self {
        match raw {
            RawExpr::Number(constant) => Self::constant(constant),
            RawExpr::Linear { constant, terms } => Self { constant, terms },
        }
    }
}

impl LinearExpr {
    pub fn constant(value: f64) -> Self {
        Self {
            constant: value,
            terms: BTreeMap::new(),
        }
    }

    pub fn with_term(mut self, var: &str, coeff: f64) -> Self {
        *self.terms.entry(var.to_string()).or_insert(0.0) += coeff;
        self
    }

    /// Unknown variables evaluate to zero.
    pub fn eval(&self, vars: &HashMap<String, f64>) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * vars.get(var).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }

    pub fn depends_on(&self, var: &str) -> bool {
        self.terms.get(var).is_some_and(|c| *c != 0.0)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }

    pub fn is_zero(&self) -> bool {
        self.constant == 0.0 && self.terms.values().all(|c| *c == 0.0)
    }
}

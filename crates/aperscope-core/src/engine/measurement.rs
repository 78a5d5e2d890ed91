use super::error::EngineError;
use crate::core::io::timeseries::TimeSeriesSource;
use crate::core::models::beam::Beam;
use crate::core::models::bpm::BpmTable;
use crate::core::models::optics::OpticsTable;

pub const BPM_POSITIONS_H: &str = "BFC.LHC:OrbitAcq:positionsH";
pub const BPM_POSITIONS_V: &str = "BFC.LHC:OrbitAcq:positionsV";
pub const BPM_NAMES: &str = "BFC.LHC:Mappings:fBPMNames_h";

/// Archive key of the measured full gap of a collimator, in millimetres.
pub fn gap_key(collimator: &str) -> String {
    format!("{}:MEAS_LVDT_GD", collimator.to_ascii_uppercase())
}

/// Full jaw gap of `collimator` at `time`, in metres.
pub fn read_gap(
    source: &impl TimeSeriesSource,
    collimator: &str,
    time: f64,
) -> Result<f64, EngineError> {
    let key = gap_key(collimator);
    let values = source.sample(&key, time)?.numbers(&key)?;
    match values.first() {
        Some(gap_mm) if gap_mm.is_finite() => Ok(gap_mm * 1e-3),
        Some(gap_mm) => Err(EngineError::FormatMismatch(format!(
            "gap of '{}' at t = {} is not finite ({})",
            collimator, time, gap_mm
        ))),
        None => Err(EngineError::MissingResource(format!(
            "no gap recorded for '{}' at t = {}",
            collimator, time
        ))),
    }
}

/// One orbit acquisition of every monitor of the ring, positions in metres.
#[derive(Debug, Clone, PartialEq)]
pub struct BpmAcquisition {
    pub timestamp: f64,
    pub names: Vec<String>,
    pub h: Vec<f64>,
    pub v: Vec<f64>,
}

impl BpmAcquisition {
    pub fn table(&self, beam: Beam, optics: &OpticsTable) -> BpmTable {
        BpmTable::from_acquisition(&self.names, &self.h, &self.v, beam, optics)
    }
}

pub fn read_bpm(source: &impl TimeSeriesSource, time: f64) -> Result<BpmAcquisition, EngineError> {
    let h = source.sample(BPM_POSITIONS_H, time)?;
    let timestamp = h.timestamp;
    let h = h.numbers(BPM_POSITIONS_H)?;
    let v = source
        .sample(BPM_POSITIONS_V, time)?
        .numbers(BPM_POSITIONS_V)?;
    let names = source.sample(BPM_NAMES, time)?.names(BPM_NAMES)?;
    if h.len() != names.len() || v.len() != names.len() {
        return Err(EngineError::FormatMismatch(format!(
            "BPM acquisition has {} names, {} horizontal and {} vertical readings",
            names.len(),
            h.len(),
            v.len()
        )));
    }
    Ok(BpmAcquisition {
        timestamp,
        names,
        h: h.into_iter().map(|x| x * 1e-3).collect(),
        v: v.into_iter().map(|y| y * 1e-3).collect(),
    })
}

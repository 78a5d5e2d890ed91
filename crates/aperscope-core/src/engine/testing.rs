//! Synthetic two-beam ring shared by the engine tests.
//!
//! Four 100 m FODO cells centred on `ip1`, `ip3`, `ip5` and `ip7`. Every cell
//! carries dispersion-suppressor markers, orbit correctors, monitors and two
//! collimators; beam 2 is the mirror image of beam 1.

use super::config::ModelConfig;
use super::model::OpticsModel;
use crate::core::io::line::LineFile;
use crate::core::io::timeseries::SnapshotFile;
use crate::core::lattice::thin::Lattice;
use crate::core::models::beam::{Beam, BeamPair};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};

pub const LENGTH: f64 = 400.0;
pub const GAMMA: f64 = 479.6050161552533;
pub const KQF: f64 = 0.02;
pub const KQD: f64 = -0.02;
pub const IRS: [u8; 4] = [1, 3, 5, 7];

pub struct FixtureElement {
    pub name: String,
    pub s: f64,
    pub kind: &'static str,
    pub spec: Value,
}

fn ip_position(ir: u8) -> f64 {
    f64::from(ir - 1) / 2.0 * 100.0
}

/// Elements of `beam` in the beam-1 frame, unsorted.
pub fn elements(beam: Beam) -> Vec<FixtureElement> {
    let b = beam.suffix();
    let mut out = Vec::new();
    let mut push = |name: String, offset: f64, ir: u8, kind: &'static str, extra: Value| {
        let s = (ip_position(ir) + offset).rem_euclid(LENGTH);
        let mut spec = json!({ "name": name, "kind": kind });
        if let (Value::Object(spec), Value::Object(extra)) = (&mut spec, extra) {
            spec.extend(extra);
        }
        out.push(FixtureElement {
            name,
            s,
            kind,
            spec,
        });
    };
    for ir in IRS {
        let crossing = |sign: f64| {
            let mut terms = serde_json::Map::new();
            terms.insert(format!("acbv3.{}{}{}", if sign > 0.0 { "l" } else { "r" }, ir, b), json!(1.0));
            if ir == 5 {
                terms.insert("on_x5".to_string(), json!(sign * 1e-7));
            }
            json!({ "vkick": { "terms": terms } })
        };
        push(format!("s.ds.l{ir}.{b}"), -45.0, ir, "marker", json!({}));
        push(format!("tcl.4l{ir}.{b}"), -40.0, ir, "collimator", json!({}));
        push(
            format!("mcbh.3l{ir}.{b}"),
            -35.0,
            ir,
            "hkicker",
            json!({ "hkick": { "terms": { format!("acbh3.l{ir}{b}"): 1.0 } } }),
        );
        push(format!("mcbv.3l{ir}.{b}"), -34.0, ir, "vkicker", crossing(1.0));
        push(format!("bpm.2l{ir}.{b}"), -30.0, ir, "monitor", json!({}));
        push(
            format!("mq.1l{ir}.{b}"),
            -25.0,
            ir,
            "quadrupole",
            json!({ "length": 3.0, "k1l": { "terms": { "kqd": 1.0 } } }),
        );
        push(
            format!("mcbxh.1l{ir}"),
            -20.0,
            ir,
            "hkicker",
            json!({ "hkick": { "terms": { format!("acbxh1.l{ir}"): 1.0 } } }),
        );
        push(format!("mb.9l{ir}.{b}"), -10.0, ir, "sbend", json!({ "angle": 0.01 }));
        push(format!("ip{ir}"), 0.0, ir, "marker", json!({}));
        push(format!("drift_{ir}"), 5.0, ir, "drift", json!({}));
        push(format!("mb.9r{ir}.{b}"), 10.0, ir, "sbend", json!({ "angle": 0.01 }));
        push(
            format!("mq.1r{ir}.{b}"),
            25.0,
            ir,
            "quadrupole",
            json!({ "length": 3.0, "k1l": { "terms": { "kqf": 1.0 } } }),
        );
        push(format!("mq.1r{ir}.{b}_aper"), 25.5, ir, "aperture", json!({}));
        push(format!("bpm.2r{ir}.{b}"), 30.0, ir, "monitor", json!({}));
        push(
            format!("mcbh.3r{ir}.{b}"),
            35.0,
            ir,
            "hkicker",
            json!({ "hkick": { "terms": { format!("acbh3.r{ir}{b}"): 1.0 } } }),
        );
        push(format!("mcbv.3r{ir}.{b}"), 36.0, ir, "vkicker", crossing(-1.0));
        push(format!("tcp.c6r{ir}.{b}"), 40.0, ir, "collimator", json!({}));
        push(format!("e.ds.r{ir}.{b}"), 45.0, ir, "marker", json!({}));
    }
    out
}

fn vars(beam: Beam) -> Value {
    let b = beam.suffix();
    let mut vars = serde_json::Map::new();
    vars.insert("kqf".into(), json!(KQF));
    vars.insert("kqd".into(), json!(KQD));
    vars.insert("on_x5".into(), json!(0.0));
    for ir in IRS {
        vars.insert(format!("acbxh1.l{ir}"), json!(0.0));
        for side in ["l", "r"] {
            vars.insert(format!("acbh3.{side}{ir}{b}"), json!(0.0));
            vars.insert(format!("acbv3.{side}{ir}{b}"), json!(0.0));
        }
    }
    Value::Object(vars)
}

/// Lattice document of `beam` in its own direction of travel.
pub fn line_json(beam: Beam) -> Value {
    scaled_line_json(beam, 1.0)
}

/// [`line_json`] with every position and the ring length multiplied by `scale`.
pub fn scaled_line_json(beam: Beam, scale: f64) -> Value {
    let mut elements: Vec<Value> = elements(beam)
        .into_iter()
        .map(|e| {
            let s = if beam.is_reversed() {
                (LENGTH - e.s).rem_euclid(LENGTH)
            } else {
                e.s
            };
            let mut spec = e.spec;
            spec["s"] = json!(s * scale);
            spec
        })
        .collect();
    elements.sort_by(|a, b| a["s"].as_f64().partial_cmp(&b["s"].as_f64()).unwrap());
    json!({
        "name": format!("ring_{}", beam.suffix()),
        "length": LENGTH * scale,
        "particle": { "gamma0": GAMMA },
        "vars": vars(beam),
        "elements": elements,
    })
}

pub fn lattice(beam: Beam) -> Lattice {
    scaled_lattice(beam, 1.0)
}

fn scaled_lattice(beam: Beam, scale: f64) -> Lattice {
    let file: LineFile = serde_json::from_value(scaled_line_json(beam, scale)).unwrap();
    Lattice::from_file(file).unwrap()
}

pub fn model() -> OpticsModel {
    model_with(ModelConfig::default())
}

pub fn model_with(config: ModelConfig) -> OpticsModel {
    OpticsModel::new(
        BeamPair::new(lattice(Beam::B1), lattice(Beam::B2)),
        config,
    )
    .unwrap()
}

/// Fixture ring stretched by `scale`, so positions stop being round numbers.
pub fn scaled_model(scale: f64) -> OpticsModel {
    OpticsModel::new(
        BeamPair::new(scaled_lattice(Beam::B1, scale), scaled_lattice(Beam::B2, scale)),
        ModelConfig::default(),
    )
    .unwrap()
}

/// Writes both line files into `dir` and returns the beam-1 path.
pub fn write_lines(dir: &Path) -> PathBuf {
    for beam in Beam::ALL {
        let path = dir.join(format!("ring_{}.json", beam.suffix()));
        fs::write(&path, line_json(beam).to_string()).unwrap();
    }
    dir.join("ring_b1.json")
}

/// Aperture tables `aperture_B1.tfs` / `aperture_B4.tfs`, one beam-screen row
/// per element (positions off by 0.5 m) plus rows the reader must drop.
pub fn write_aperture(dir: &Path) -> PathBuf {
    for (beam, tag) in [(Beam::B1, "B1"), (Beam::B2, "B4")] {
        let mut text = String::from(
            "@ NAME %s \"APERTURE\"\n* NAME S APER_1 APER_2 APER_3 APER_4\n$ %s %le %le %le %le\n",
        );
        for e in elements(beam) {
            text.push_str(&format!(
                "\"{}\" {} 0.022 0.0176 0.022 0.022\n",
                e.name.to_ascii_uppercase(),
                e.s + 0.5
            ));
        }
        text.push_str("\"VOID.1\" 12.0 0.0 0.0 0.0 0.0\n");
        text.push_str("\"HUGE.1\" 13.0 9.0 9.0 9.0 9.0\n");
        fs::write(dir.join(format!("aperture_{tag}.tfs")), text).unwrap();
    }
    dir.join("aperture_B1.tfs")
}

/// Machine component tables `components_B1.tfs` / `components_B4.tfs`.
pub fn write_components(dir: &Path) -> PathBuf {
    for (beam, tag) in [(Beam::B1, "B1"), (Beam::B2, "B4")] {
        let mut text = String::from(
            "@ NAME %s \"COMPONENTS\"\n* NAME KEYWORD S L K1L\n$ %s %s %le %le %le\n",
        );
        for e in elements(beam) {
            let (keyword, length, k1l) = match e.kind {
                "quadrupole" if e.name.starts_with("mq.1l") => ("QUADRUPOLE", 3.0, KQD),
                "quadrupole" => ("QUADRUPOLE", 3.0, KQF),
                "sbend" => ("SBEND", 1.0, 0.0),
                "collimator" => ("COLLIMATOR", 1.0, 0.0),
                _ => ("MARKER", 0.0, 0.0),
            };
            text.push_str(&format!(
                "\"{}\" \"{}\" {} {} {}\n",
                e.name.to_ascii_uppercase(),
                keyword,
                e.s,
                length,
                k1l
            ));
        }
        fs::write(dir.join(format!("components_{tag}.tfs")), text).unwrap();
    }
    dir.join("components_B1.tfs")
}

pub const COLLIMATORS_YAML: &str = r#"
collimators:
  b1:
    tcl.4l5.b1: {gap: 5.7, angle: 0}
    tcp.c6r5.b1: {gap: 6.0, angle: 90}
    tcl.4l1.b1: {gap: 8.0, angle: 0}
    tcsk.4r5.b1: {gap: 7.0, angle: 45}
    tcl.9l5.b1: {gap: 9.0, angle: 0}
    tcp.c6r1.b1: {gap: null, angle: 0}
  b2:
    tcl.4l5.b2: {gap: 5.7, angle: 180}
    tcp.c6r5.b2: {gap: 6.0, angle: 90}
"#;

pub fn write_collimators(dir: &Path) -> PathBuf {
    let path = dir.join("collimators.yaml");
    fs::write(&path, COLLIMATORS_YAML).unwrap();
    path
}

/// Archive document holding the current model orbit at every monitor of both
/// beams, recorded at `timestamp`.
pub fn bpm_document(model: &OpticsModel, timestamp: f64) -> Value {
    let mut names = Vec::new();
    let mut h = Vec::new();
    let mut v = Vec::new();
    for beam in Beam::ALL {
        for row in model.snapshot(beam).rows() {
            if row.name.starts_with("bpm") {
                names.push(row.name.to_ascii_uppercase());
                h.push(row.x * 1e3);
                v.push(row.y * 1e3);
            }
        }
    }
    json!({
        "BFC.LHC:OrbitAcq:positionsH": { "timestamps": [timestamp], "values": [h] },
        "BFC.LHC:OrbitAcq:positionsV": { "timestamps": [timestamp], "values": [v] },
        "BFC.LHC:Mappings:fBPMNames_h": { "timestamps": [0.0], "values": [names] },
    })
}

pub fn bpm_snapshot(model: &OpticsModel, timestamp: f64) -> SnapshotFile {
    SnapshotFile::parse(&bpm_document(model, timestamp).to_string()).unwrap()
}

/// Writes [`bpm_document`] to `dir/snapshot.json`.
pub fn write_bpm_snapshot(dir: &Path, model: &OpticsModel, timestamp: f64) -> PathBuf {
    let path = dir.join("snapshot.json");
    fs::write(&path, bpm_document(model, timestamp).to_string()).unwrap();
    path
}

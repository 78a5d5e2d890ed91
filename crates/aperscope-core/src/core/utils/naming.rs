use crate::core::models::beam::{Beam, Plane};

/// Orbit-corrector knob name decomposed as `<family><position><plane>[s].<region>[b1|b2]`,
/// e.g. `acbch6.l5b1` or the common `acbxh1.l5`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectorKnob<'a> {
    pub name: &'a str,
    pub plane: Plane,
    pub position: Option<u32>,
    pub region: &'a str,
    /// `None` for knobs shared by both beams.
    pub beam: Option<Beam>,
}

impl CorrectorKnob<'_> {
    pub fn applies_to(&self, beam: Beam) -> bool {
        self.beam.is_none_or(|b| b == beam)
    }
}

fn plane_from_letter(letter: char) -> Option<Plane> {
    match letter {
        'h' => Some(Plane::Horizontal),
        'v' => Some(Plane::Vertical),
        _ => None,
    }
}

fn split_beam_suffix(token: &str) -> (&str, Option<Beam>) {
    if let Some(rest) = token.strip_suffix("b1") {
        (rest, Some(Beam::B1))
    } else if let Some(rest) = token.strip_suffix("b2") {
        (rest, Some(Beam::B2))
    } else {
        (token, None)
    }
}

fn trailing_number(token: &str) -> (&str, Option<u32>) {
    let stem = token.trim_end_matches(|c: char| c.is_ascii_digit());
    (stem, token[stem.len()..].parse().ok())
}

pub fn parse_acb_knob(name: &str) -> Option<CorrectorKnob<'_>> {
    if !name.starts_with("acb") {
        return None;
    }
    let (prefix, location) = name.split_once('.')?;
    let (stem, position) = trailing_number(prefix);
    let stem = stem.strip_suffix('s').unwrap_or(stem);
    let plane = plane_from_letter(stem.chars().last()?)?;
    let (region, beam) = split_beam_suffix(location);
    if region.is_empty() {
        return None;
    }
    Some(CorrectorKnob {
        name,
        plane,
        position,
        region,
        beam,
    })
}

/// Orbit-corrector magnet name `mcb<type><plane>[s].<position><region>[.b1|.b2]`,
/// e.g. `mcbch.6l5.b1`, `mcbyhs.a4r1.b2` or the common `mcbxh.1l5`.
pub fn parse_mcb_element(name: &str) -> Option<CorrectorKnob<'_>> {
    if !name.starts_with("mcb") {
        return None;
    }
    let mut parts = name.split('.');
    let prefix = parts.next()?;
    let location = parts.next()?;
    let beam = match parts.next() {
        Some("b1") => Some(Beam::B1),
        Some("b2") => Some(Beam::B2),
        Some(_) => return None,
        None => None,
    };
    let stem = prefix.strip_suffix('s').unwrap_or(prefix);
    let plane = plane_from_letter(stem.chars().last()?)?;

    let side = location.rfind(['l', 'r'])?;
    let region = &location[side..];
    let position = location[..side]
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .parse()
        .ok();
    Some(CorrectorKnob {
        name,
        plane,
        position,
        region,
        beam,
    })
}

/// Keeps the correctors of `beam` and `plane` in `region`, ordered by their
/// distance from the interaction point and then by name.
pub fn select_by_region<'a>(
    names: impl IntoIterator<Item = &'a str>,
    parse: impl Fn(&'a str) -> Option<CorrectorKnob<'a>>,
    beam: Beam,
    plane: Plane,
    region: &str,
) -> Vec<String> {
    let region = region.to_ascii_lowercase();
    let mut selected: Vec<CorrectorKnob> = names
        .into_iter()
        .filter_map(parse)
        .filter(|k| k.plane == plane && k.region == region && k.applies_to(beam))
        .collect();
    selected.sort_by(|a, b| {
        a.position
            .unwrap_or(u32::MAX)
            .cmp(&b.position.unwrap_or(u32::MAX))
            .then_with(|| a.name.cmp(b.name))
    });
    selected.dedup_by(|a, b| a.name == b.name);
    selected.into_iter().map(|k| k.name.to_string()).collect()
}

/// `name` as spelled on `beam`: a trailing `.b1`/`.b2` takes the suffix of
/// `beam`, names shared by both rings are returned unchanged.
pub fn element_on_beam(name: &str, beam: Beam) -> String {
    match name.rsplit_once('.') {
        Some((stem, "b1" | "b2")) => format!("{}.{}", stem, beam.suffix()),
        _ => name.to_string(),
    }
}

/// Markers delimiting the dispersion suppressors around interaction region `ir`.
pub fn ir_markers(ir: u8, beam: Beam) -> (String, String) {
    (
        format!("s.ds.l{}.{}", ir, beam.suffix()),
        format!("e.ds.r{}.{}", ir, beam.suffix()),
    )
}

/// Whether `name` sits on the left (`l<ir>`) or right (`r<ir>`) side of `ir`.
pub fn ir_side(name: &str, ir: u8) -> Option<char> {
    let left = format!("l{}", ir);
    let right = format!("r{}", ir);
    name.split('.').find_map(|segment| {
        let segment = split_beam_suffix(segment).0;
        let side = segment.rfind(['l', 'r'])?;
        let token = &segment[side..];
        let before = &segment[..side];
        let anchored = before.is_empty() || before.ends_with(|c: char| c.is_ascii_digit());
        if !anchored {
            None
        } else if token == left {
            Some('l')
        } else if token == right {
            Some('r')
        } else {
            None
        }
    })
}

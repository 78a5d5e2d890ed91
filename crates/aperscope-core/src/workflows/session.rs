use crate::core::models::beam::Beam;
use crate::engine::config::SessionConfig;
use crate::engine::error::EngineError;
use crate::engine::model::OpticsModel;
use crate::engine::progress::{Progress, ProgressReporter};
use tracing::{info, instrument};

/// Opens a model as described by `config`.
///
/// Knob overrides are applied before the nominal orbit is taken, so the
/// nominal reference is the configured machine rather than the one stored in
/// the line files. Tables are loaded after the overrides so that collimator
/// jaws sit on the configured orbit.
#[instrument(skip_all, name = "session_workflow")]
pub fn open(config: &SessionConfig, reporter: &ProgressReporter) -> Result<OpticsModel, EngineError> {
    // === Phase 1: Beam lines ===
    reporter.report(Progress::PhaseStart {
        name: "Loading Lines",
    });
    info!(line = %config.line_path.display(), "Opening beam lines.");
    let mut model = OpticsModel::open(&config.line_path, config.model.clone())?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Knob overrides ===
    if !config.knobs.is_empty() {
        reporter.report(Progress::PhaseStart {
            name: "Applying Knobs",
        });
        for (knob, value) in &config.knobs {
            model.change_knob(knob, *value)?;
        }
        model.twiss()?;
        model.renominalise();
        info!(count = config.knobs.len(), "Knob overrides applied.");
        reporter.report(Progress::PhaseFinish);
    }

    // === Phase 3: Machine tables ===
    reporter.report(Progress::PhaseStart {
        name: "Loading Tables",
    });
    if let Some(path) = &config.aperture_path {
        model.load_aperture(path)?;
    }
    if let Some(path) = &config.elements_path {
        model.load_elements(path)?;
    }
    if let Some(path) = &config.collimators_path {
        model.load_collimators(path)?;
    }
    reporter.report(Progress::PhaseFinish);

    // === Phase 4: Reference origin ===
    if let Some(anchor) = &config.anchor {
        reporter.report(Progress::PhaseStart { name: "Cycling" });
        model.cycle(anchor)?;
        reporter.report(Progress::PhaseFinish);
    }

    info!(
        aperture = model.aperture(Beam::B1).is_some(),
        collimators = model.collimators(Beam::B1).is_some(),
        anchor = model.anchor().unwrap_or("none"),
        "Session ready."
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::beam::Plane;
    use crate::engine::config::SessionConfigBuilder;
    use crate::engine::testing;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[test]
    fn opens_a_complete_session() {
        let dir = tempdir().unwrap();
        let config = SessionConfigBuilder::new()
            .line_path(testing::write_lines(dir.path()))
            .aperture_path(Some(testing::write_aperture(dir.path())))
            .elements_path(Some(testing::write_components(dir.path())))
            .collimators_path(Some(testing::write_collimators(dir.path())))
            .anchor(Some("IP5".into()))
            .knob("on_x5", 20.0)
            .build()
            .unwrap();

        let phases = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&phases);
        let reporter = ProgressReporter::with_callback(Box::new(move |p| {
            if let Progress::PhaseStart { name } = p {
                sink.lock().unwrap().push(name);
            }
        }));
        let mut model = open(&config, &reporter).unwrap();

        assert_eq!(
            *phases.lock().unwrap(),
            vec!["Loading Lines", "Applying Knobs", "Loading Tables", "Cycling"]
        );
        assert_eq!(model.anchor(), Some("ip5"));
        for beam in Beam::ALL {
            assert_eq!(model.snapshot(beam).get("ip5").unwrap().s, 0.0);
            assert!(model.aperture(beam).is_some());
            assert!(model.elements(beam).is_some());
            assert!(model.collimators(beam).is_some());
        }
        assert_eq!(model.knob("on_x5").unwrap().current, 20.0);

        let t = model.trajectory(Beam::B1, Plane::Vertical).unwrap();
        assert!(t.orbit.iter().zip(&t.nominal).all(|(o, n)| (o - n).abs() < 1e-15));
        assert!(t.orbit.iter().any(|o| o.abs() > 1e-9));
    }

    #[test]
    fn optional_tables_and_phases_are_skipped() {
        let dir = tempdir().unwrap();
        let config = SessionConfigBuilder::new()
            .line_path(testing::write_lines(dir.path()))
            .build()
            .unwrap();
        let model = open(&config, &ProgressReporter::new()).unwrap();
        assert!(model.aperture(Beam::B1).is_none());
        assert!(model.anchor().is_none());
    }

    #[test]
    fn missing_line_is_a_missing_resource() {
        let dir = tempdir().unwrap();
        let config = SessionConfigBuilder::new()
            .line_path(dir.path().join("ring_b1.json"))
            .build()
            .unwrap();
        let err = open(&config, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(err, EngineError::MissingResource(_)));
    }

    #[test]
    fn unknown_anchor_is_rejected() {
        let dir = tempdir().unwrap();
        let config = SessionConfigBuilder::new()
            .line_path(testing::write_lines(dir.path()))
            .anchor(Some("ip9".into()))
            .build()
            .unwrap();
        let err = open(&config, &ProgressReporter::new()).unwrap_err();
        assert!(matches!(err, EngineError::Domain(_)));
    }
}

//! End-to-end review scenarios, run against both storage backends.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::Utc;
use serde_json::{json, Value};
use tempfile::TempDir;

use review_engine::catalog::VersionRepository;
use review_engine::config::{Backend, EngineConfig};
use review_engine::engine::Engine;
use review_engine::model::{PredictionId, PredictionStatus, Section, VersionId};
use review_engine::service::ReviewError;

/// An engine plus whatever keeps its storage alive.
struct Harness {
    engine: Engine,
    _dir: Option<TempDir>,
}

fn memory() -> Harness {
    Harness {
        engine: Engine::open(EngineConfig::in_memory()).unwrap(),
        _dir: None,
    }
}

fn git() -> Harness {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new(dir.path()).backend(Backend::Git);
    Harness {
        engine: Engine::open(config).unwrap(),
        _dir: Some(dir),
    }
}

fn both() -> Vec<(&'static str, Harness)> {
    vec![("memory", memory()), ("git", git())]
}

fn save(engine: &Engine, prediction: &str, text: &str, approve: bool) -> Result<VersionId, ReviewError> {
    engine
        .workflow()
        .save_version(&json!({
            "predictionId": prediction,
            "modelVersion": "model-1",
            "content": {
                "chloralkaliInDepth": format!("{} in depth", text),
                "chloralkaliSummary": format!("{} summary", text),
            },
            "approve": approve
        }))
        .map(|summary| summary.id)
}

fn set_approval(engine: &Engine, version: &VersionId, approve: bool) -> Result<bool, ReviewError> {
    engine
        .workflow()
        .set_approval(version.as_str(), &json!({ "approve": approve }))
        .map(|summary| summary.is_approved)
}

fn approved_ids(engine: &Engine, prediction: &str) -> Vec<VersionId> {
    engine
        .workflow()
        .list_versions(prediction)
        .unwrap()
        .into_iter()
        .filter(|v| v.is_approved)
        .map(|v| v.id)
        .collect()
}

fn register(engine: &Engine, id: &str, done: bool) -> PredictionId {
    let id = PredictionId::new(id).unwrap();
    engine.register_prediction(Some(id.clone()), "acme", "model-1").unwrap();
    if done {
        engine.complete_prediction(&id).unwrap();
    }
    id
}

#[test]
fn approval_handover_on_finished_prediction() {
    for (backend, h) in both() {
        let engine = &h.engine;
        register(engine, "p1", true);

        let v1 = save(engine, "p1", "first", false).unwrap();
        let v2 = save(engine, "p1", "second", false).unwrap();

        assert!(set_approval(engine, &v1, true).unwrap(), "{backend}");
        let err = set_approval(engine, &v2, true).unwrap_err();
        assert!(matches!(err, ReviewError::AlreadyApproved { .. }), "{backend}: {err}");
        assert_eq!(approved_ids(engine, "p1"), vec![v1.clone()], "{backend}");

        assert!(!set_approval(engine, &v1, false).unwrap(), "{backend}");
        assert!(set_approval(engine, &v2, true).unwrap(), "{backend}");
        assert_eq!(approved_ids(engine, "p1"), vec![v2], "{backend}");
    }
}

#[test]
fn in_progress_prediction_accepts_drafts_only() {
    for (backend, h) in both() {
        let engine = &h.engine;
        let pid = register(engine, "p1", false);

        let v1 = save(engine, "p1", "draft", false).unwrap();
        for flag in [true, false] {
            let err = set_approval(engine, &v1, flag).unwrap_err();
            assert!(matches!(err, ReviewError::PredictionNotReady(_)), "{backend}: {err}");
        }
        assert!(approved_ids(engine, "p1").is_empty(), "{backend}");

        engine.complete_prediction(&pid).unwrap();
        assert!(set_approval(engine, &v1, true).unwrap(), "{backend}");
    }
}

#[test]
fn concurrent_approved_saves_admit_exactly_one() {
    for (backend, h) in both() {
        let engine = Arc::new(h.engine);
        register(&engine, "p1", true);

        let threads = 4;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let engine = Arc::clone(&engine);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    save(&engine, "p1", &format!("writer {}", i), true)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "{backend}");
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, ReviewError::AlreadyApproved { .. })),
            "{backend}"
        );
        assert_eq!(approved_ids(&engine, "p1").len(), 1, "{backend}");
        assert_eq!(engine.workflow().list_versions("p1").unwrap().len(), 1, "{backend}");
    }
}

#[test]
fn content_round_trips_with_empty_defaults() {
    for (backend, h) in both() {
        let engine = &h.engine;
        register(engine, "p1", true);
        let v1 = save(engine, "p1", "body", false).unwrap();

        let content = engine.workflow().version_content(v1.as_str()).unwrap();
        assert!(!content.is_approved, "{backend}");
        assert_eq!(
            content.content.get(Section::ChloralkaliSummary),
            &Some("body summary".to_string()),
            "{backend}"
        );
        assert_eq!(
            content.content.get(Section::ElectrodialysisSummary),
            &Some(String::new()),
            "{backend}"
        );

        let json: Value = serde_json::to_value(&content).unwrap();
        assert_eq!(json["content"]["chloralkaliInDepth"], json!("body in depth"), "{backend}");
    }
}

#[test]
fn versions_are_listed_newest_first() {
    for (backend, h) in both() {
        let engine = &h.engine;
        register(engine, "p1", true);
        register(engine, "p2", true);

        let ids: Vec<VersionId> = (0..3)
            .map(|i| save(engine, "p1", &format!("rev {}", i), false).unwrap())
            .collect();
        save(engine, "p2", "other", false).unwrap();

        let listed: Vec<VersionId> = engine
            .workflow()
            .list_versions("p1")
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        let expected: Vec<VersionId> = ids.into_iter().rev().collect();
        assert_eq!(listed, expected, "{backend}");
    }
}

#[test]
fn unknown_and_malformed_references() {
    for (backend, h) in both() {
        let workflow = h.engine.workflow();
        assert!(matches!(workflow.list_versions("nobody"), Err(ReviewError::NotFound(_))), "{backend}");
        assert!(matches!(workflow.version_content("nothing"), Err(ReviewError::NotFound(_))), "{backend}");
        assert!(matches!(workflow.list_versions("no/body"), Err(ReviewError::InvalidInput(_))), "{backend}");
        assert!(
            matches!(
                workflow.save_version(&json!({"predictionId": "nobody", "modelVersion": "m", "content": {}})),
                Err(ReviewError::NotFound(_))
            ),
            "{backend}"
        );
    }
}

#[test]
fn git_store_keeps_approval_across_reopen() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new(dir.path());

    let v1 = {
        let engine = Engine::open(config.clone()).unwrap();
        register(&engine, "p1", true);
        save(&engine, "p1", "kept", true).unwrap()
    };

    let engine = Engine::open(config).unwrap();
    assert_eq!(approved_ids(&engine, "p1"), vec![v1.clone()]);
    let v2 = save(&engine, "p1", "new", false).unwrap();
    assert!(matches!(
        set_approval(&engine, &v2, true),
        Err(ReviewError::AlreadyApproved { .. })
    ));
}

#[test]
fn separate_engines_on_one_store_admit_one_approval() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new(dir.path());
    let first = Arc::new(Engine::open(config.clone()).unwrap());
    let second = Arc::new(Engine::open(config).unwrap());

    for round in 0..5 {
        let prediction = format!("p{}", round);
        register(&first, &prediction, true);

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [&first, &second]
            .into_iter()
            .map(|engine| {
                let engine = Arc::clone(engine);
                let barrier = Arc::clone(&barrier);
                let prediction = prediction.clone();
                thread::spawn(move || {
                    barrier.wait();
                    save(&engine, &prediction, "racer", true)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "round {round}: {results:?}");
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, ReviewError::AlreadyApproved { .. })),
            "round {round}: {results:?}"
        );
        assert_eq!(approved_ids(&first, &prediction).len(), 1, "round {round}");
        assert_eq!(approved_ids(&second, &prediction).len(), 1, "round {round}");
    }
}

#[test]
fn separate_engines_cannot_approve_two_drafts() {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::new(dir.path());
    let first = Engine::open(config.clone()).unwrap();
    let second = Engine::open(config).unwrap();

    register(&first, "p1", true);
    let v1 = save(&first, "p1", "one", false).unwrap();
    let v2 = save(&second, "p1", "two", false).unwrap();

    assert!(set_approval(&first, &v1, true).unwrap());
    assert!(matches!(
        set_approval(&second, &v2, true),
        Err(ReviewError::AlreadyApproved { .. })
    ));
    assert_eq!(approved_ids(&second, "p1"), vec![v1]);
}

#[test]
fn finished_prediction_stays_finished() {
    for (backend, h) in both() {
        let engine = &h.engine;
        let pid = register(engine, "p1", true);

        let result = engine
            .repository()
            .update_prediction_status(&pid, PredictionStatus::InProgress, Utc::now());
        assert!(result.is_err(), "{backend}");
        let v1 = save(engine, "p1", "kept", false).unwrap();
        assert!(set_approval(engine, &v1, true).unwrap(), "{backend}");
    }
}

//! review-engine - versioning and approval of human-reviewed prediction
//! reports.
//!
//! A machine-generated prediction becomes a chain of human-edited
//! versions. Each version's five report sections live in a content store;
//! its row in the version repository points at them. At most one version
//! of a prediction is approved at any time, and nothing can be approved
//! while the prediction itself is still being generated.
//!
//! Both stores come in an in-memory and a Git-backed flavour. In the Git
//! flavour every write is a commit, so the full review history is kept in
//! `.git/`.
//!
//! # Example
//!
//! ```no_run
//! use review_engine::config::EngineConfig;
//! use review_engine::engine::Engine;
//! use serde_json::json;
//!
//! let engine = Engine::open(EngineConfig::new("./reviews")).unwrap();
//! let prediction = engine.register_prediction(None, "acme", "model-1").unwrap();
//! engine.complete_prediction(&prediction.id).unwrap();
//!
//! let saved = engine
//!     .workflow()
//!     .save_version(&json!({
//!         "predictionId": prediction.id.as_str(),
//!         "modelVersion": "model-1",
//!         "content": { "chloralkaliSummary": "Membrane cells are viable." },
//!         "approve": true
//!     }))
//!     .unwrap();
//! assert!(saved.is_approved);
//! ```

pub mod catalog;
pub mod config;
pub mod content;
pub mod engine;
pub mod model;
pub mod service;
pub mod storage;
pub mod transaction;

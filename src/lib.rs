// Wattsim - Energy consumption telemetry simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Wattsim - Energy consumption telemetry simulator
//!
//! Simulates IoT energy meters: synthetic readings per device, severity
//! classification, grouped alerts and contextual suggestions, all persisted
//! through a pluggable document store.
//!
//! ## Key Features
//!
//! - **Target tier mix**: 25% critical / 35% warning / 40% excellent, with
//!   short trend-following runs per device
//! - **Weighted-majority alerts**: one alert per device per aggregation cycle
//! - **Contextual suggestions**: season, night and weekend aware tips
//! - **Deterministic**: injectable seed and clock
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use wattsim::{Engine, EngineConfig, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::with_devices(["meter-1", "meter-2"]));
//! let engine = Engine::new(EngineConfig::new().with_seed(42), store.clone()).unwrap();
//!
//! for _ in 0..5 {
//!     engine.run_update_cycle();
//! }
//! let report = engine.run_aggregation_cycle();
//!
//! assert_eq!(report.alerts.len(), 2);
//! assert_eq!(store.alerts().len(), 2);
//! assert!(engine.buffers().is_empty());
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Tiers, readings and tier counts
//! - [`generator`]: Synthetic value generation
//! - [`classifier`]: Threshold classification
//! - [`buffer`]: Bounded per-device reading buffers
//! - [`aggregator`]: Predominant-tier alerts
//! - [`suggestion`]: Message templates and contextual tips
//! - [`context`]: Temporal context and clocks
//! - [`store`]: Document store trait and backends
//! - [`engine`]: The update, aggregation and retention cycles

// Modules
pub mod aggregator;
pub mod buffer;
pub mod classifier;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod generator;
pub mod protocol;
pub mod store;
pub mod suggestion;

// Re-exports for convenient access
pub use aggregator::{aggregate, AggregatedAlert};
pub use buffer::{AlertBuffer, BufferStore};
pub use classifier::{classify, Classification};
pub use config::{
    ClearPolicy, EngineConfig, Features, GeneratorConfig, ScheduleConfig, SuggestionConfig,
};
pub use context::{Clock, FixedClock, SystemClock, TemporalContext};
pub use engine::{AggregationReport, Engine, SweepReport, UpdateReport};
pub use error::{Result, StoreError, WattsimError};
pub use generator::Generator;
pub use protocol::{Reading, Tier, TierCounts};
pub use store::{
    AlertRecord, DocumentStore, FileStore, HistoryRecord, MemoryStore, SuggestionRecord,
};
pub use suggestion::{Suggestion, SuggestionGenerator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

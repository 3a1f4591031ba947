//! # gs-optimizer
//!
//! Stateless ask/tell orchestration.  Each request carries the full search
//! space and evaluation history; the orchestrator validates it, projects the
//! history onto a training set, builds a fresh backend adapter, tells it the
//! data once and asks it for the next batch.
//!
//! ```no_run
//! use gs_optimizer::{InitRequest, Orchestrator};
//! use gs_types::OptimizerSettings;
//!
//! let settings = OptimizerSettings::new("SKOPT-GP")
//!     .with_parameter("x", 0.0, 1.0)
//!     .with_parameter("y", 0.0, 1.0)
//!     .with_num_init_points(3);
//! let response = Orchestrator::default()
//!     .initialize(InitRequest { settings })
//!     .unwrap();
//! assert_eq!(response.points.len(), 3);
//! ```

pub mod adapters;
pub mod backend;
pub mod factory;
pub mod formatter;
pub mod history;
pub mod orchestrator;
pub mod padding;

pub use adapters::{AdapterState, BackendAdapter, NormalizedAdapter};
pub use backend::BackendKind;
pub use factory::OptimizerFactory;
pub use formatter::ResponseFormatter;
pub use history::{HistoryParser, ParseReport, RecordPolicy};
pub use orchestrator::{ContinueRequest, InitRequest, OptimizationResponse, Orchestrator};
pub use padding::PaddingPolicy;

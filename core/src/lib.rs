//! Mind the App: simulate a user × event-month panel around an app install
//! and recover the injected effect with a two-way fixed-effects estimator.
//!
//! Data flows one way: `SimConfig` → `simulator::generate` → `PanelTable`
//! → (`table_io` / `store`) → `estimator::estimate`.

pub mod absorb;
pub mod config;
pub mod error;
pub mod estimator;
pub mod event_study;
pub mod ols;
pub mod outcome;
pub mod panel;
pub mod presets;
pub mod rng;
pub mod simulator;
pub mod store;
pub mod summary;
pub mod table_io;
pub mod types;

pub use config::SimConfig;
pub use error::{ErrorKind, PanelError, PanelResult};
pub use estimator::{estimate, estimate_with, EstimationResult, EstimatorSpec, TimeIndex};
pub use panel::PanelTable;
pub use simulator::generate;

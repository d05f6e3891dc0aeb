//! PV power simulation driven by gridded reanalysis weather.
//!
//! The numerical pipeline lives in `services`; `physics` holds the scalar
//! sub-models it maps over the (time × location) grid and `weather` the
//! gridded sources it reads from. The remaining modules make up the HTTP
//! service started by the binary.

pub mod api_docs;
pub mod config;
pub mod controllers;
pub mod error;
pub mod logging;
pub mod models;
pub mod physics;
pub mod routes;
pub mod services;
pub mod shared_state;
pub mod weather;

pub use error::{Result, SimError};
pub use models::location::{Location, LocationSet};
pub use models::simulation_config::SimulationConfig;
pub use models::table::TimeSeries2D;
pub use services::pv_simulation::{PvSimulation, simulate};

pub mod api;
pub mod location;
pub mod parameters;
pub mod simulation_config;
pub mod table;

pub mod decomposition;
pub mod generation;
pub mod plane_of_array;
pub mod pv_simulation;
pub mod solar_geometry;

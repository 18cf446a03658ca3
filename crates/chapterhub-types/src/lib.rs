pub mod api;
pub mod audit;
pub mod models;
pub mod normalize;

pub mod model;
pub mod repo;

pub use model::{Portfolio, Transaction};

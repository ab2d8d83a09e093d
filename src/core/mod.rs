pub mod float;

pub use float::SprFloat;

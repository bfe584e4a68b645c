pub mod reflector;
pub mod sampler;

pub use reflector::{ReflectedColumn, ReflectedSchema, ReflectedTable, Reflector};
pub use sampler::{SampledTable, Sampler};

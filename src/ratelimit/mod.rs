//! Rate limiting engine: policies, decisions, and admission.

mod chain;
mod decision;
mod engine;
mod key;
mod policy;

pub use chain::{Partitioner, PolicyChain, GLOBAL_PARTITION};
pub use decision::Decision;
pub use engine::{RateLimiter, Usage};
pub use key::CounterKey;
pub use policy::{Algorithm, Policy};

//! Developer tooling: read-only inspection of the spatial index for
//! debugging, profiling, and development UI.

mod inspector;

pub use inspector::{IndexInspector, IndexSummary};

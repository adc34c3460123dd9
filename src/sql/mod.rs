//! SQL generation: dialects, fragments, the renderer and the predicate combinator.

pub mod combinator;
pub mod dialect;
pub mod fragment;
pub mod render;

pub use combinator::{Connective, Embedding, PredicateState};
pub use dialect::Dialect;
pub use fragment::{Precedence, SqlFragment};
pub use render::Renderer;

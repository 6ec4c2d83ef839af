//! Transaction engine
//!
//! Every change to the graph is a `Mutation`, lowered to a call of a named
//! transaction function that the store runs atomically in log order. The
//! functions check the caller's expected version at apply time, so racing
//! writers fail with a conflict instead of merging.

mod args;
mod engine;
mod entity_functions;
mod instance_functions;
mod mutation;
mod relationship_functions;

pub use args::Args;
pub use engine::{all_functions, TransactionEngine, TxError};
pub use instance_functions::Versioned;
pub use mutation::{names, Expect, FunctionCall, Mutation};

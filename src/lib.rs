//! A hierarchical state chart engine with parallel (orthogonal) regions and
//! *joint states* — pseudo-nodes active iff an arbitrary set of other nodes
//! are all simultaneously active.
//!
//! The engine is declared once as a [`tree::StateTree`] (built with
//! [`builder::StateTreeBuilder`] or assembled directly), then driven through
//! an [`engine::Engine`] via [`engine::Engine::initiate`],
//! [`engine::Engine::process`], and [`engine::Engine::terminate`]. Handlers
//! attached to nodes emit `reply` values and `transit` requests through
//! [`handlers::DispatchContext`]; the engine computes the minimal exit/entry
//! sequence for any requested set of targets and runs it to completion
//! before the next event is considered.
//!
//! See [`diagnostics::Diagnostics`] for the host-overridable error/trace
//! surface, and [`error::ConfigError`] for the one error kind that is a
//! genuine `Result` (tree construction).

pub mod active;
pub mod builder;
pub mod diagnostics;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod planner;
pub mod prelude;
pub mod reply;
pub mod tree;

//! Convenience re-exports for the common case: build a tree, drive an engine.

pub use crate::active::{ActiveSet, ActiveSnapshot};
pub use crate::builder::StateTreeBuilder;
pub use crate::diagnostics::{Diagnostics, NoopDiagnostics};
pub use crate::engine::{Engine, Initiate, Terminate};
pub use crate::error::ConfigError;
pub use crate::handlers::DispatchContext;
pub use crate::ids::{AnyEvent, AnyReply, JointId, NodeId, NodeType};
pub use crate::tree::{Node, NodeKind, StateTree};

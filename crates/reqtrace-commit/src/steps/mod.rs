//! Standard commit steps, in pipeline order

mod carry_forward;
mod notify;
mod persist_artifacts;
mod persist_traces;
mod stamp;
mod suppress;

pub use carry_forward::CarryForward;
pub use notify::EmitNotifications;
pub use persist_artifacts::PersistArtifacts;
pub use persist_traces::PersistTraces;
pub use stamp::StampVersion;
pub use suppress::SuppressStaleLinks;

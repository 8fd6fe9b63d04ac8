pub mod event;
pub mod permission;
pub mod resource;

pub use event::{EventKind, ResourceEvent};
pub use permission::{ActionSet, ActionType, PermissionGrant};
pub use resource::{FileInfo, Resource, ResourceType};

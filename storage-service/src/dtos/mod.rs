pub mod permissions;
pub mod resources;

pub use permissions::{
    AccessParams, AccessResponse, AuthorizedGroupsResponse, GrantResponse, PermissionRequest,
};
pub use resources::{
    BlobParams, ChildrenResponse, CreateDirectoryRequest, PresignedUrlResponse, RenameRequest,
    ResourceResponse,
};

pub mod blobs;
pub mod directories;
pub mod files;
pub mod health;
pub mod permissions;

pub use blobs::get_blob;
pub use directories::{
    create_directory, delete_directory, get_directory, list_children, rename_directory,
};
pub use files::{delete_file, download_file, get_file, presign_file_url, rename_file, upload_file};
pub use health::{health_check, metrics_endpoint, readiness_check};
pub use permissions::{check_access, grant_permission, list_authorized_groups, revoke_permission};

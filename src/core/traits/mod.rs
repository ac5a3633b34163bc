pub mod backend;
pub mod cipher;
pub mod cloud_transfer;
pub mod mount_lister;
pub mod reporter;

pub mod backup_service;
pub mod mirror;
pub mod mount_manager;
pub mod remote_resolver;
pub mod sync_service;

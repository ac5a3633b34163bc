pub mod manifest;
pub mod mount_table;
pub mod outcome;
pub mod remote;
pub mod repository;
pub mod snapshot;
pub mod source;

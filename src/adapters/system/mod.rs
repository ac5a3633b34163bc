pub mod mount_lister;

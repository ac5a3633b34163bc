pub mod rclone;

pub mod backends;
pub mod cipher;
pub mod process;
pub mod system;
pub mod transfer;

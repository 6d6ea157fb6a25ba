pub mod gates;
pub mod hook;
pub mod init;
pub mod lock;
pub mod phase;
pub mod queue;
pub mod task;
pub mod team;

pub mod log;
pub mod storage;
pub mod timer;

pub mod storage;
pub mod vision;

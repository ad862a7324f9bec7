pub mod auth;
pub mod bus;
pub mod engine;
pub mod storage;

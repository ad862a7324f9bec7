pub mod authorizer;
pub mod bus;
pub mod codec;
pub mod engine;
pub mod pipeline;
pub mod runner;
pub mod storage;
pub mod workspace;

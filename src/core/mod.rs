pub mod buffer;
pub mod conversations;
pub mod ingest;
pub mod invoker;
pub mod persistence;
pub mod records;
pub mod relay;
pub mod run;
pub mod session;

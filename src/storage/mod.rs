//! 本地文件存储模块

mod data_store;

pub use data_store::DataStore;

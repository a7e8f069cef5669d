// 访问控制模块
// API 密钥的签发、校验、吊销与层级/功能判定

pub mod access_control;

pub use access_control::{AccessControl, ApiKeyRecord, IssuedKey};

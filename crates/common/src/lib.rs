/// 虚拟磁盘协调 - 公共库
/// 
/// 提供磁盘数据模型、错误处理、容量换算等共享工具

pub mod errors;
pub mod models;
pub mod utils;

// 重新导出常用类型
pub use errors::{Error, Result};

/// 共享数据模型
/// 
/// 定义期望磁盘、观测磁盘和协调结果等数据结构

pub mod disk;

pub use disk::{
    DesiredDisk,
    DiskFormat,
    DiskMetadata,
    DiskMetadataSet,
    DiskType,
    ObservedDisk,
};

/// 常量定义
pub mod constants {
    /// 单个控制器上允许的最大磁盘数量（包含主磁盘）
    pub const MAX_DISK_NUMBER: u32 = 30;

    /// 主磁盘固定绑定的端口
    pub const PRIMARY_PORT: u32 = 0;

    /// 当前所有挂载都使用 device 0
    pub const DEFAULT_DEVICE: u32 = 0;

    /// 默认管理的存储控制器
    pub const DEFAULT_CONTROLLER: &str = "SATA Controller";
}

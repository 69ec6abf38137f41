/// 虚拟化驱动抽象层
/// 
/// 协调逻辑只通过该接口访问 hypervisor，便于替换实现和测试

use async_trait::async_trait;
use common::models::{DiskFormat, ObservedDisk};
use common::Result;
use std::collections::HashMap;
use std::path::Path;

use super::attachment::Slot;

/// 挂载的介质类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediumKind {
    Hdd,
    Dvd,
    Floppy,
}

impl MediumKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediumKind::Hdd => "hdd",
            MediumKind::Dvd => "dvddrive",
            MediumKind::Floppy => "fdd",
        }
    }
}

/// 虚拟化驱动 Trait
#[async_trait]
pub trait HypervisorDriver: Send + Sync + 'static {
    /// 列出 hypervisor 已知的全部磁盘
    async fn list_disks(&self) -> Result<Vec<ObservedDisk>>;

    /// 获取虚拟机的原始键值信息（包含挂载槽位绑定和配置文件路径）
    async fn show_guest_info(&self) -> Result<HashMap<String, String>>;

    /// 创建磁盘文件，返回新磁盘的 UUID
    async fn create_disk(&self, path: &Path, size_bytes: u64, format: &DiskFormat) -> Result<String>;

    /// 将磁盘挂载到控制器的指定槽位
    async fn attach_disk(&self, slot: Slot, path: &Path, kind: MediumKind) -> Result<()>;

    /// 原地调整磁盘大小
    async fn resize_disk(&self, path: &Path, size_bytes: u64) -> Result<()>;

    /// 从指定槽位卸载介质
    async fn remove_disk(&self, slot: Slot) -> Result<()>;

    /// 释放介质（按 UUID 或路径）
    async fn close_medium(&self, medium: &str) -> Result<()>;

    /// 克隆磁盘并转换为目标格式
    async fn clone_disk(&self, source: &Path, dest: &Path, format: &DiskFormat) -> Result<()>;

    /// 被管理的存储控制器名称
    fn controller(&self) -> &str;

    /// 获取驱动类型
    fn driver_type(&self) -> &str;
}

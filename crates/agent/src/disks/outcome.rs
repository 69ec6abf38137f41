/// 协调结果
/// 
/// 各组件返回结构化结果，由调用方统一输出，核心逻辑本身不负责提示用户

use common::models::{DiskMetadata, DiskMetadataSet, DiskType};
use common::utils::format_bytes;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::hypervisor::Slot;

/// 跳过原因
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// floppy / dvd 暂不支持
    UnsupportedType { disk_type: DiskType },
    /// 控制器上没有空闲槽位
    NoFreeSlot,
    /// 主磁盘不会被清理
    PrimaryProtected,
    /// 需要清理的磁盘已经不存在
    AlreadyGone,
}

/// 拒绝原因
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    Shrink { current_mb: f64, requested_mb: f64 },
    AmbiguousMatch { count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Created { path: PathBuf, size_bytes: u64, slot: Option<Slot> },
    Resized { from_mb: f64, to_mb: f64, rebuilt: bool },
    Reattached { slot: Slot },
    Removed { slot: Option<Slot> },
    NoChange,
    Skipped(SkipReason),
    Rejected(RejectReason),
}

/// 单个磁盘的处理记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskReport {
    pub name: String,
    pub disk_type: DiskType,
    pub outcomes: Vec<Outcome>,
    pub metadata: Option<DiskMetadata>,
}

impl DiskReport {
    pub fn new(name: impl Into<String>, disk_type: DiskType) -> Self {
        Self {
            name: name.into(),
            disk_type,
            outcomes: Vec::new(),
            metadata: None,
        }
    }

    pub fn push(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    pub fn with_metadata(mut self, metadata: DiskMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// 输出该磁盘的全部处理结果
    pub fn log(&self) {
        let name = &self.name;
        for outcome in &self.outcomes {
            match outcome {
                Outcome::Created { path, size_bytes, slot: Some(slot) } => info!(
                    "磁盘 {} 已创建: path={:?}, size={}, 挂载于 {}",
                    name,
                    path,
                    format_bytes(*size_bytes),
                    slot
                ),
                Outcome::Created { path, size_bytes, slot: None } => warn!(
                    "磁盘 {} 已创建: path={:?}, size={}，但控制器没有空闲槽位，暂不挂载",
                    name,
                    path,
                    format_bytes(*size_bytes)
                ),
                Outcome::Resized { from_mb, to_mb, rebuilt } => info!(
                    "磁盘 {} 已从 {} MB 扩容到 {} MB{}",
                    name,
                    from_mb,
                    to_mb,
                    if *rebuilt { "（经格式转换重建）" } else { "" }
                ),
                Outcome::Reattached { slot } => {
                    warn!("磁盘 {} 未挂载到虚拟机，已重新挂载于 {}", name, slot)
                }
                Outcome::Removed { .. } => info!("磁盘 {} 已不在配置中，已删除", name),
                Outcome::NoChange => info!("磁盘 {} 无需变更", name),
                Outcome::Skipped(SkipReason::UnsupportedType { disk_type }) => {
                    warn!("暂不支持 {} 类型的磁盘，跳过 {}", disk_type, name)
                }
                Outcome::Skipped(SkipReason::NoFreeSlot) => {
                    warn!("控制器没有空闲槽位，磁盘 {} 保持未挂载", name)
                }
                Outcome::Skipped(SkipReason::PrimaryProtected) => {
                    warn!("磁盘 {} 是主磁盘，不会被删除", name)
                }
                Outcome::Skipped(SkipReason::AlreadyGone) => {
                    info!("磁盘 {} 已不存在，无需清理", name)
                }
                Outcome::Rejected(RejectReason::Shrink { current_mb, requested_mb }) => warn!(
                    "磁盘 {} 当前 {} MB，请求 {} MB，不支持缩容",
                    name, current_mb, requested_mb
                ),
                Outcome::Rejected(RejectReason::AmbiguousMatch { count }) => warn!(
                    "找到 {} 块名为 {} 的磁盘，无法确定要管理哪一块",
                    count, name
                ),
            }
        }
    }
}

/// 一次批量协调的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub metadata: DiskMetadataSet,
    pub disks: Vec<DiskReport>,
}

impl ReconcileReport {
    pub(crate) fn record(&mut self, report: DiskReport) {
        if let Some(metadata) = &report.metadata {
            self.metadata.push(report.disk_type, metadata.clone());
        }
        self.disks.push(report);
    }

    pub fn log(&self) {
        for disk in &self.disks {
            disk.log();
        }
    }
}

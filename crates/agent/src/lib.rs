/// 虚拟磁盘协调 - Agent
/// 
/// 将虚拟机期望的磁盘列表与 hypervisor 实际状态对齐，作为虚拟机开通流程中的一步调用

pub mod config;
pub mod disks;
pub mod hypervisor;

pub use disks::{DiskReconciler, ReconcileReport};

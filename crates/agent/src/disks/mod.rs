/// 磁盘协调
/// 
/// 槽位分配、磁盘匹配、容量比较、扩容编排以及顶层协调流程

pub mod cleanup;
pub mod compare;
pub mod matcher;
pub mod outcome;
pub mod reconciler;
pub mod resize;
pub mod slot;

#[cfg(test)]
pub(crate) mod testing;

pub use outcome::{DiskReport, Outcome, ReconcileReport, RejectReason, SkipReason};
pub use reconciler::DiskReconciler;

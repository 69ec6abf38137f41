/// 容量比较
/// 
/// 两侧都换算为整 MB 后比较，格式差异不参与比较

use common::models::{DesiredDisk, ObservedDisk};
use common::utils::{bytes_to_whole_megabytes, capacity_to_megabytes};
use common::Result;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizeComparison {
    NoChange,
    Grow { current_mb: f64, requested_mb: f64 },
    /// 不支持缩容，保持原样
    RejectShrink { current_mb: f64, requested_mb: f64 },
}

pub fn needs_resize(desired: &DesiredDisk, observed: &ObservedDisk) -> Result<SizeComparison> {
    // hypervisor 按整 MB 分配，非整 MB 的请求按舍去后的值比较，否则永远不收敛
    let current_mb = capacity_to_megabytes(&observed.capacity)?.floor();
    let requested_mb = bytes_to_whole_megabytes(desired.size) as f64;

    Ok(if current_mb > requested_mb {
        SizeComparison::RejectShrink { current_mb, requested_mb }
    } else if current_mb < requested_mb {
        SizeComparison::Grow { current_mb, requested_mb }
    } else {
        SizeComparison::NoChange
    })
}

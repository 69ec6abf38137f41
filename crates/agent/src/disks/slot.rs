/// 槽位分配
/// 
/// 每次需要空闲槽位时都基于最新的挂载映射重新计算，不保存占用状态

use common::models::constants::{DEFAULT_DEVICE, MAX_DISK_NUMBER, PRIMARY_PORT};

use crate::hypervisor::{AttachmentMap, Slot};

/// 主磁盘固定所在的槽位
pub fn primary_slot() -> Slot {
    Slot::new(PRIMARY_PORT, DEFAULT_DEVICE)
}

/// 返回控制器上编号最小的空闲端口，全部占用时返回 None
pub fn next_free_slot(attachments: &AttachmentMap, controller: &str) -> Option<Slot> {
    let used = attachments.occupied_ports(controller);
    (0..MAX_DISK_NUMBER)
        .find(|port| !used.contains(port))
        .map(|port| Slot::new(port, DEFAULT_DEVICE))
}

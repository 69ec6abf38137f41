/// 磁盘匹配
/// 
/// 主磁盘按槽位 (0, 0) 绑定的 UUID 识别，hypervisor 列出磁盘的顺序不可依赖；
/// 其他磁盘按名称识别

use common::models::{DesiredDisk, ObservedDisk};

use crate::hypervisor::AttachmentMap;
use super::slot::primary_slot;

/// 匹配结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskMatch<'a> {
    Found(&'a ObservedDisk),
    Missing,
    /// 多个观测磁盘同名，无法确定对应关系
    Ambiguous(usize),
}

/// 为期望磁盘查找对应的已有磁盘
pub fn find_existing<'a>(
    desired: &DesiredDisk,
    observed: &'a [ObservedDisk],
    attachments: &AttachmentMap,
    controller: &str,
) -> DiskMatch<'a> {
    if desired.primary {
        return attachments
            .uuid_at(controller, primary_slot())
            .and_then(|uuid| observed.iter().find(|d| d.uuid == uuid))
            .map_or(DiskMatch::Missing, DiskMatch::Found);
    }

    let mut candidates = observed.iter().filter(|d| d.name == desired.name);
    match (candidates.next(), candidates.count()) {
        (None, _) => DiskMatch::Missing,
        (Some(disk), 0) => DiskMatch::Found(disk),
        (Some(_), rest) => DiskMatch::Ambiguous(rest + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::{DiskFormat, DiskType};
    use crate::hypervisor::Slot;

    const SATA: &str = "SATA Controller";

    fn observed(uuid: &str, name: &str) -> ObservedDisk {
        ObservedDisk {
            uuid: uuid.to_string(),
            name: name.to_string(),
            location: format!("/vms/guest/{}.vdi", name).into(),
            capacity: "10240 MBytes".to_string(),
            storage_format: DiskFormat::Vdi,
        }
    }

    #[test]
    fn test_primary_matched_by_slot_binding() {
        let disks = vec![
            observed("uuid-data", "data"),
            observed("uuid-boot", "ubuntu-disk001"),
            observed("uuid-other", "other"),
        ];
        let mut map = AttachmentMap::new();
        map.bind(SATA, Slot::new(0, 0), "uuid-boot");
        map.bind(SATA, Slot::new(1, 0), "uuid-data");

        let desired = DesiredDisk::new("vagrant_primary", DiskType::Disk, 0).primary();
        assert_eq!(
            find_existing(&desired, &disks, &map, SATA),
            DiskMatch::Found(&disks[1])
        );
    }

    #[test]
    fn test_primary_without_binding() {
        let disks = vec![observed("uuid-boot", "vagrant_primary")];
        let desired = DesiredDisk::new("vagrant_primary", DiskType::Disk, 0).primary();
        // 名称相同也不作为主磁盘的依据
        assert_eq!(
            find_existing(&desired, &disks, &AttachmentMap::new(), SATA),
            DiskMatch::Missing
        );
    }

    #[test]
    fn test_named_disk() {
        let disks = vec![observed("uuid-1", "data"), observed("uuid-2", "logs")];
        let map = AttachmentMap::new();

        let desired = DesiredDisk::new("logs", DiskType::Disk, 0);
        assert_eq!(find_existing(&desired, &disks, &map, SATA), DiskMatch::Found(&disks[1]));

        let desired = DesiredDisk::new("cache", DiskType::Disk, 0);
        assert_eq!(find_existing(&desired, &disks, &map, SATA), DiskMatch::Missing);
    }

    #[test]
    fn test_duplicate_names_are_ambiguous() {
        let disks = vec![
            observed("uuid-1", "data"),
            observed("uuid-2", "data"),
            observed("uuid-3", "data"),
        ];
        let desired = DesiredDisk::new("data", DiskType::Disk, 0);
        assert_eq!(
            find_existing(&desired, &disks, &AttachmentMap::new(), SATA),
            DiskMatch::Ambiguous(3)
        );
    }
}

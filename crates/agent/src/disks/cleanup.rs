/// 磁盘清理
/// 
/// 删除上一次协调记录过、但已不在期望列表中的磁盘。主磁盘永远不会被删除

use common::models::{DesiredDisk, DiskMetadataSet, DiskType};
use common::Result;
use std::collections::HashSet;
use tracing::debug;

use super::outcome::{DiskReport, Outcome, SkipReason};
use super::reconciler::{validate, DiskReconciler};
use super::slot::primary_slot;

impl DiskReconciler {
    /// 清理不再需要的磁盘
    ///
    /// `previous` 为上一次协调返回并由调用方持久化的元数据
    pub async fn cleanup_disks(
        &self,
        previous: &DiskMetadataSet,
        desired: &[DesiredDisk],
    ) -> Result<Vec<DiskReport>> {
        let mut reports = Vec::new();
        if previous.disk.is_empty() || !self.enabled {
            return Ok(reports);
        }

        // 期望列表本身不合法时，不删除任何磁盘
        validate(desired)?;

        let wanted: HashSet<&str> = desired
            .iter()
            .filter(|d| d.disk_type == DiskType::Disk)
            .map(|d| d.name.as_str())
            .collect();
        let stale: Vec<_> = previous
            .disk
            .iter()
            .filter(|m| !wanted.contains(m.name.as_str()))
            .collect();
        if stale.is_empty() {
            debug!("没有需要清理的磁盘");
            return Ok(reports);
        }

        let observed = self.driver.list_disks().await?;
        let controller = self.driver.controller();

        for metadata in stale {
            let mut report = DiskReport::new(&metadata.name, DiskType::Disk);

            if !observed.iter().any(|d| d.uuid == metadata.uuid) {
                report.push(Outcome::Skipped(SkipReason::AlreadyGone));
                reports.push(report);
                continue;
            }

            let guest = self.guest_info().await?;
            let slot = guest.attachments.slot_of(controller, &metadata.uuid);
            if slot == Some(primary_slot()) {
                report.push(Outcome::Skipped(SkipReason::PrimaryProtected));
                reports.push(report);
                continue;
            }

            if let Some(slot) = slot {
                self.driver.remove_disk(slot).await?;
            }
            self.driver.close_medium(&metadata.uuid).await?;

            report.push(Outcome::Removed { slot });
            reports.push(report);
        }

        Ok(reports)
    }
}

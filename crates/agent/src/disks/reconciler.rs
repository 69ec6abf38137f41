/// 磁盘协调器
/// 
/// 对比期望磁盘列表与 hypervisor 的实际状态，按需创建、扩容或重新挂载磁盘。
/// 所有 hypervisor 调用按顺序依次执行，不做并发

use common::models::constants::MAX_DISK_NUMBER;
use common::models::{DesiredDisk, DiskMetadata, DiskType, ObservedDisk};
use common::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::hypervisor::{GuestInfo, HypervisorDriver, MediumKind};
use super::compare::{needs_resize, SizeComparison};
use super::matcher::{find_existing, DiskMatch};
use super::outcome::{DiskReport, Outcome, ReconcileReport, RejectReason, SkipReason};
use super::resize::{resize, Placement};
use super::slot::next_free_slot;

/// 磁盘协调器
pub struct DiskReconciler {
    pub(super) driver: Arc<dyn HypervisorDriver>,
    /// 磁盘管理功能开关，关闭时所有操作都是空操作
    pub(super) enabled: bool,
}

impl DiskReconciler {
    pub fn new(driver: Arc<dyn HypervisorDriver>, enabled: bool) -> Self {
        Self { driver, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(super) async fn guest_info(&self) -> Result<GuestInfo> {
        let raw = self.driver.show_guest_info().await?;
        Ok(GuestInfo::from_machine_readable(&raw))
    }

    /// 批量协调入口
    ///
    /// 超出磁盘数量上限等校验错误在任何修改之前返回
    pub async fn reconcile_all(&self, desired: &[DesiredDisk]) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        if desired.is_empty() || !self.enabled {
            debug!("跳过磁盘管理: disks={}, enabled={}", desired.len(), self.enabled);
            return Ok(report);
        }

        validate(desired)?;

        let has_disks = desired.iter().any(|d| d.disk_type == DiskType::Disk);
        let observed = if has_disks {
            self.driver.list_disks().await?
        } else {
            Vec::new()
        };

        for disk in desired {
            let disk_report = match disk.disk_type {
                DiskType::Disk => self.reconcile_one(disk, &observed).await?,
                DiskType::Floppy | DiskType::Dvd => {
                    let mut skipped = DiskReport::new(&disk.name, disk.disk_type);
                    skipped.push(Outcome::Skipped(SkipReason::UnsupportedType {
                        disk_type: disk.disk_type,
                    }));
                    skipped
                }
            };
            report.record(disk_report);
        }

        Ok(report)
    }

    /// 协调单个磁盘
    pub async fn reconcile_one(&self, desired: &DesiredDisk, observed: &[ObservedDisk]) -> Result<DiskReport> {
        let mut report = DiskReport::new(&desired.name, desired.disk_type);
        let guest = self.guest_info().await?;
        let controller = self.driver.controller();

        let existing = match find_existing(desired, observed, &guest.attachments, controller) {
            DiskMatch::Found(existing) => existing,
            DiskMatch::Missing => return self.create(desired, &guest, report).await,
            DiskMatch::Ambiguous(count) => {
                report.push(Outcome::Rejected(RejectReason::AmbiguousMatch { count }));
                return Ok(report);
            }
        };

        let mut uuid = existing.uuid.clone();
        let mut check_attachment = true;
        match needs_resize(desired, existing)? {
            SizeComparison::Grow { current_mb, requested_mb } => {
                let resized = resize(self.driver.as_ref(), desired, existing).await?;
                report.push(Outcome::Resized {
                    from_mb: current_mb,
                    to_mb: requested_mb,
                    rebuilt: !existing.storage_format.is_resizable(),
                });
                uuid = resized.disk.uuid;
                // 重建流程已经处理过挂载
                match resized.placement {
                    Placement::Unchanged => {}
                    Placement::Restored(_) => check_attachment = false,
                    Placement::Attached(slot) => {
                        report.push(Outcome::Reattached { slot });
                        check_attachment = false;
                    }
                    Placement::NoFreeSlot => {
                        report.push(Outcome::Skipped(SkipReason::NoFreeSlot));
                        check_attachment = false;
                    }
                }
            }
            SizeComparison::RejectShrink { current_mb, requested_mb } => {
                report.push(Outcome::Rejected(RejectReason::Shrink { current_mb, requested_mb }));
            }
            SizeComparison::NoChange => {}
        }

        // 确认磁盘仍挂载在虚拟机上
        if check_attachment && guest.attachments.slot_of(controller, &existing.uuid).is_none() {
            match next_free_slot(&guest.attachments, controller) {
                Some(slot) => {
                    self.driver
                        .attach_disk(slot, &existing.location, MediumKind::Hdd)
                        .await?;
                    report.push(Outcome::Reattached { slot });
                }
                None => report.push(Outcome::Skipped(SkipReason::NoFreeSlot)),
            }
        }

        if report.outcomes.is_empty() {
            report.push(Outcome::NoChange);
        }

        Ok(report.with_metadata(DiskMetadata {
            uuid,
            name: desired.name.clone(),
        }))
    }

    async fn create(&self, desired: &DesiredDisk, guest: &GuestInfo, mut report: DiskReport) -> Result<DiskReport> {
        let path = guest
            .guest_folder()?
            .join(format!("{}.{}", desired.name, desired.disk_ext.extension()));
        let slot = next_free_slot(&guest.attachments, self.driver.controller());

        let uuid = self
            .driver
            .create_disk(&path, desired.size, &desired.disk_ext)
            .await?;
        if let Some(slot) = slot {
            self.driver.attach_disk(slot, &path, MediumKind::Hdd).await?;
        }

        report.push(Outcome::Created {
            path,
            size_bytes: desired.size,
            slot,
        });
        Ok(report.with_metadata(DiskMetadata {
            uuid,
            name: desired.name.clone(),
        }))
    }
}

/// 修改前的批量校验
pub(super) fn validate(desired: &[DesiredDisk]) -> Result<()> {
    let disks: Vec<_> = desired
        .iter()
        .filter(|d| d.disk_type == DiskType::Disk)
        .collect();

    if disks.len() > MAX_DISK_NUMBER as usize {
        return Err(Error::LimitExceeded(format!(
            "{} disks configured, at most {} are supported",
            disks.len(),
            MAX_DISK_NUMBER
        )));
    }

    let primaries = disks.iter().filter(|d| d.primary).count();
    if primaries > 1 {
        return Err(Error::InvalidArgument(format!(
            "{} disks are marked primary, at most one is allowed",
            primaries
        )));
    }

    let mut names = HashSet::new();
    if let Some(dup) = disks.iter().find(|d| !names.insert(d.name.as_str())) {
        return Err(Error::InvalidArgument(format!("Duplicate disk name '{}'", dup.name)));
    }

    Ok(())
}

/// 磁盘扩容
/// 
/// VDI 等格式直接原地扩容；VMDK 不能原地扩容，需要先克隆为 VDI、扩容、
/// 再克隆回 VMDK 并挂回原槽位。该流程不是事务性的，中途失败不会回滚，
/// 失败时返回已到达的阶段

use common::models::{DesiredDisk, DiskFormat, ObservedDisk};
use common::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

use crate::hypervisor::{GuestInfo, HypervisorDriver, MediumKind, Slot};
use super::slot::next_free_slot;

/// 格式转换扩容流程的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeStage {
    Pending,
    /// 原磁盘已克隆为可扩容格式
    Cloned,
    /// 中间磁盘已扩容
    Resized,
    /// 原磁盘已卸载并释放
    Detached,
    /// 中间磁盘已克隆回原格式
    ClonedBack,
    /// 新磁盘已挂载
    Attached,
    /// 中间磁盘已释放
    Closed,
}

impl fmt::Display for ResizeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResizeStage::Pending => "pending",
            ResizeStage::Cloned => "cloned",
            ResizeStage::Resized => "resized",
            ResizeStage::Detached => "detached",
            ResizeStage::ClonedBack => "cloned back",
            ResizeStage::Attached => "attached",
            ResizeStage::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// 某一步失败，`reached` 为失败前最后完成的阶段
#[derive(Debug)]
pub struct ResizeFailure {
    pub reached: ResizeStage,
    pub source: Error,
}

impl From<ResizeFailure> for Error {
    fn from(failure: ResizeFailure) -> Self {
        Error::ResizeInterrupted {
            stage: failure.reached.to_string(),
            source: Box::new(failure.source),
        }
    }
}

/// 扩容后磁盘的挂载情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// 扩容没有改动挂载
    Unchanged,
    /// 重建的磁盘挂回了原槽位
    Restored(Slot),
    /// 原磁盘未挂载，重建后挂到了空闲槽位
    Attached(Slot),
    /// 原磁盘未挂载，且控制器上没有空闲槽位
    NoFreeSlot,
}

/// 扩容结果
#[derive(Debug, Clone)]
pub struct ResizedDisk {
    pub disk: ObservedDisk,
    pub placement: Placement,
}

/// 格式转换扩容
pub struct ConversionResize<'a> {
    driver: &'a dyn HypervisorDriver,
    original: &'a ObservedDisk,
    size_bytes: u64,
    /// 原磁盘所在槽位，未挂载时为 None
    slot: Option<Slot>,
    intermediate: PathBuf,
    stage: ResizeStage,
    placement: Placement,
}

impl<'a> ConversionResize<'a> {
    pub fn new(
        driver: &'a dyn HypervisorDriver,
        original: &'a ObservedDisk,
        size_bytes: u64,
        slot: Option<Slot>,
    ) -> Self {
        let intermediate = original.location.with_extension(DiskFormat::Vdi.extension());
        Self {
            driver,
            original,
            size_bytes,
            slot,
            intermediate,
            stage: ResizeStage::Pending,
            placement: Placement::Unchanged,
        }
    }

    pub fn stage(&self) -> ResizeStage {
        self.stage
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// 执行下一步，返回新到达的阶段
    async fn advance(&mut self) -> Result<ResizeStage> {
        let driver = self.driver;
        let next = match self.stage {
            ResizeStage::Pending => {
                driver
                    .clone_disk(&self.original.location, &self.intermediate, &DiskFormat::Vdi)
                    .await?;
                ResizeStage::Cloned
            }
            ResizeStage::Cloned => {
                driver.resize_disk(&self.intermediate, self.size_bytes).await?;
                ResizeStage::Resized
            }
            ResizeStage::Resized => {
                if let Some(slot) = self.slot {
                    driver.remove_disk(slot).await?;
                }
                driver.close_medium(&self.original.uuid).await?;
                ResizeStage::Detached
            }
            ResizeStage::Detached => {
                driver
                    .clone_disk(&self.intermediate, &self.original.location, &self.original.storage_format)
                    .await?;
                ResizeStage::ClonedBack
            }
            ResizeStage::ClonedBack => {
                let placement = match self.slot {
                    Some(slot) => Placement::Restored(slot),
                    None => {
                        let info = GuestInfo::from_machine_readable(&driver.show_guest_info().await?);
                        next_free_slot(&info.attachments, driver.controller())
                            .map_or(Placement::NoFreeSlot, Placement::Attached)
                    }
                };
                if let Placement::Restored(slot) | Placement::Attached(slot) = placement {
                    driver
                        .attach_disk(slot, &self.original.location, MediumKind::Hdd)
                        .await?;
                }
                self.placement = placement;
                ResizeStage::Attached
            }
            ResizeStage::Attached => {
                driver
                    .close_medium(&self.intermediate.to_string_lossy())
                    .await?;
                ResizeStage::Closed
            }
            ResizeStage::Closed => ResizeStage::Closed,
        };

        debug!("扩容 {:?}: {} -> {}", self.original.location, self.stage, next);
        self.stage = next;
        Ok(next)
    }

    /// 执行到结束或在第一处失败停下
    pub async fn run(&mut self) -> std::result::Result<(), ResizeFailure> {
        while self.stage != ResizeStage::Closed {
            if let Err(source) = self.advance().await {
                return Err(ResizeFailure {
                    reached: self.stage,
                    source,
                });
            }
        }
        Ok(())
    }
}

/// 把磁盘扩容到期望大小，返回扩容后重新查询到的磁盘及其挂载情况
pub async fn resize(
    driver: &dyn HypervisorDriver,
    desired: &DesiredDisk,
    observed: &ObservedDisk,
) -> Result<ResizedDisk> {
    if observed.storage_format.is_resizable() {
        driver.resize_disk(&observed.location, desired.size).await?;
        let disk = refreshed(driver, |d| d.uuid == observed.uuid).await?;
        return Ok(ResizedDisk {
            disk,
            placement: Placement::Unchanged,
        });
    }

    let info = GuestInfo::from_machine_readable(&driver.show_guest_info().await?);
    let slot = info.attachments.slot_of(driver.controller(), &observed.uuid);

    let mut conversion = ConversionResize::new(driver, observed, desired.size, slot);
    conversion.run().await?;

    // 经过克隆重建后 UUID 已变化，按原路径查找
    let disk = refreshed(driver, |d| d.location == observed.location).await?;
    Ok(ResizedDisk {
        disk,
        placement: conversion.placement(),
    })
}

async fn refreshed<F>(driver: &dyn HypervisorDriver, predicate: F) -> Result<ObservedDisk>
where
    F: Fn(&ObservedDisk) -> bool,
{
    driver
        .list_disks()
        .await?
        .into_iter()
        .find(|d| predicate(d))
        .ok_or_else(|| Error::NotFound("Resized disk not reported by hypervisor".to_string()))
}

/// 挂载槽位解析
/// 
/// hypervisor 用 "<Controller>-ImageUUID-<port>-<device>" 形式的键描述槽位绑定，
/// 这里一次性解析为结构化映射，协调逻辑不再处理原始键

use common::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;

/// 绑定了介质 UUID 的键角色
pub const IMAGE_UUID_ROLE: &str = "ImageUUID";

/// 虚拟机配置文件路径的键
pub const CFG_FILE_KEY: &str = "CfgFile";

/// 控制器上的挂载点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Slot {
    pub port: u32,
    pub device: u32,
}

impl Slot {
    pub fn new(port: u32, device: u32) -> Self {
        Self { port, device }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "port {} device {}", self.port, self.device)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttachmentKey {
    pub controller: String,
    pub role: String,
    pub port: u32,
    pub device: u32,
}

impl AttachmentKey {
    /// 解析 "SATA Controller-ImageUUID-0-0"，不符合格式的键返回 None
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.rsplitn(3, '-');
        let device = parts.next()?.parse().ok()?;
        let port = parts.next()?.parse().ok()?;
        let (controller, role) = parts.next()?.rsplit_once('-')?;
        if controller.is_empty() || role.is_empty() {
            return None;
        }

        Some(Self {
            controller: controller.to_string(),
            role: role.to_string(),
            port,
            device,
        })
    }

    pub fn slot(&self) -> Slot {
        Slot::new(self.port, self.device)
    }
}

/// 控制器槽位到介质 UUID 的映射
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentMap {
    bindings: BTreeMap<AttachmentKey, String>,
}

impl AttachmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: AttachmentKey, uuid: impl Into<String>) {
        self.bindings.insert(key, uuid.into());
    }

    /// 便捷方法：记录控制器槽位上的介质
    pub fn bind(&mut self, controller: &str, slot: Slot, uuid: impl Into<String>) {
        self.insert(
            AttachmentKey {
                controller: controller.to_string(),
                role: IMAGE_UUID_ROLE.to_string(),
                port: slot.port,
                device: slot.device,
            },
            uuid,
        );
    }

    fn images<'a>(&'a self, controller: &'a str) -> impl Iterator<Item = (Slot, &'a str)> + 'a {
        self.bindings
            .iter()
            .filter(move |(key, _)| key.controller == controller && key.role == IMAGE_UUID_ROLE)
            .map(|(key, uuid)| (key.slot(), uuid.as_str()))
    }

    /// 槽位上绑定的介质 UUID
    pub fn uuid_at(&self, controller: &str, slot: Slot) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(key, _)| {
                key.controller == controller && key.role == IMAGE_UUID_ROLE && key.slot() == slot
            })
            .map(|(_, uuid)| uuid.as_str())
    }

    /// 介质当前所在的槽位
    pub fn slot_of(&self, controller: &str, uuid: &str) -> Option<Slot> {
        self.images(controller)
            .find(|(_, bound)| *bound == uuid)
            .map(|(slot, _)| slot)
    }

    /// 已占用的端口
    pub fn occupied_ports(&self, controller: &str) -> BTreeSet<u32> {
        self.images(controller).map(|(slot, _)| slot.port).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// 虚拟机信息中协调需要的部分
#[derive(Debug, Clone, Default)]
pub struct GuestInfo {
    pub cfg_file: Option<PathBuf>,
    pub attachments: AttachmentMap,
}

impl GuestInfo {
    /// 从 hypervisor 的键值输出构建
    ///
    /// 值为空或 "none" 的槽位视为未挂载
    pub fn from_machine_readable(raw: &HashMap<String, String>) -> Self {
        let mut attachments = AttachmentMap::new();
        for (key, value) in raw {
            let value = value.trim();
            if value.is_empty() || value.eq_ignore_ascii_case("none") {
                continue;
            }
            if let Some(key) = AttachmentKey::parse(key) {
                attachments.insert(key, value);
            }
        }

        let cfg_file = raw
            .get(CFG_FILE_KEY)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self {
            cfg_file,
            attachments,
        }
    }

    /// 虚拟机存放磁盘文件的目录（配置文件所在目录）
    pub fn guest_folder(&self) -> Result<PathBuf> {
        let cfg_file = self
            .cfg_file
            .as_ref()
            .ok_or_else(|| Error::Hypervisor(format!("{} not reported for guest", CFG_FILE_KEY)))?;

        cfg_file
            .parent()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| Error::Hypervisor(format!("Invalid {}: {:?}", CFG_FILE_KEY, cfg_file)))
    }
}

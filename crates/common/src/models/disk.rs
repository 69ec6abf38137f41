/// 磁盘模型
/// 
/// 期望磁盘由上层配置加载器给出，观测磁盘来自 hypervisor 的快照

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::Error;

/// 磁盘类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DiskType {
    Disk,
    Floppy,
    Dvd,
}

impl fmt::Display for DiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiskType::Disk => "disk",
            DiskType::Floppy => "floppy",
            DiskType::Dvd => "dvd",
        };
        f.write_str(s)
    }
}

/// 磁盘容器格式
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DiskFormat {
    Vdi,
    Vmdk,
    Vhd,
    Other(String),
}

impl DiskFormat {
    /// hypervisor 能否原地扩容该格式
    ///
    /// 未知格式按可原地扩容处理，失败由 hypervisor 报告
    pub fn is_resizable(&self) -> bool {
        !matches!(self, DiskFormat::Vmdk)
    }

    /// 命令行使用的格式名
    pub fn as_str(&self) -> &str {
        match self {
            DiskFormat::Vdi => "VDI",
            DiskFormat::Vmdk => "VMDK",
            DiskFormat::Vhd => "VHD",
            DiskFormat::Other(name) => name,
        }
    }

    /// 磁盘文件扩展名
    pub fn extension(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl Default for DiskFormat {
    fn default() -> Self {
        DiskFormat::Vdi
    }
}

impl fmt::Display for DiskFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiskFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidArgument("disk format is empty".to_string()));
        }
        Ok(match trimmed.to_ascii_uppercase().as_str() {
            "VDI" => DiskFormat::Vdi,
            "VMDK" => DiskFormat::Vmdk,
            "VHD" => DiskFormat::Vhd,
            other => DiskFormat::Other(other.to_string()),
        })
    }
}

impl TryFrom<String> for DiskFormat {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DiskFormat> for String {
    fn from(format: DiskFormat) -> Self {
        format.as_str().to_string()
    }
}

/// 期望磁盘定义
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesiredDisk {
    pub name: String,
    #[serde(rename = "type")]
    pub disk_type: DiskType,
    #[serde(default)]
    pub primary: bool,
    /// 请求容量（字节）
    pub size: u64,
    #[serde(default)]
    pub disk_ext: DiskFormat,
    /// hypervisor 相关的透传配置
    #[serde(default)]
    pub provider_config: HashMap<String, serde_json::Value>,
}

impl DesiredDisk {
    pub fn new(name: impl Into<String>, disk_type: DiskType, size: u64) -> Self {
        Self {
            name: name.into(),
            disk_type,
            primary: false,
            size,
            disk_ext: DiskFormat::default(),
            provider_config: HashMap::new(),
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn with_format(mut self, format: DiskFormat) -> Self {
        self.disk_ext = format;
        self
    }
}

/// hypervisor 报告的磁盘
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedDisk {
    pub uuid: String,
    /// 由 hypervisor 决定的名称，可能与期望名称不同
    pub name: String,
    pub location: PathBuf,
    /// 原始容量文本，例如 "10240 MBytes"
    pub capacity: String,
    pub storage_format: DiskFormat,
}

/// 单个磁盘协调后的元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskMetadata {
    pub uuid: String,
    pub name: String,
}

/// 按磁盘类型分组的元数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskMetadataSet {
    #[serde(default)]
    pub disk: Vec<DiskMetadata>,
    #[serde(default)]
    pub floppy: Vec<DiskMetadata>,
    #[serde(default)]
    pub dvd: Vec<DiskMetadata>,
}

impl DiskMetadataSet {
    pub fn is_empty(&self) -> bool {
        self.disk.is_empty() && self.floppy.is_empty() && self.dvd.is_empty()
    }

    pub fn push(&mut self, disk_type: DiskType, metadata: DiskMetadata) {
        match disk_type {
            DiskType::Disk => self.disk.push(metadata),
            DiskType::Floppy => self.floppy.push(metadata),
            DiskType::Dvd => self.dvd.push(metadata),
        }
    }
}

/// VirtualBox 驱动
/// 
/// 通过 VBoxManage 命令行管理虚拟机磁盘

use async_trait::async_trait;
use common::models::{DiskFormat, ObservedDisk};
use common::utils::format_bytes;
use common::{Error, Result};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, error, info};

use super::attachment::Slot;
use super::driver::{HypervisorDriver, MediumKind};

/// VirtualBox 驱动
pub struct VBoxManageDriver {
    /// VBoxManage 可执行文件
    binary: PathBuf,
    /// 虚拟机名称或 UUID
    guest: String,
    /// 被管理的存储控制器
    controller: String,
}

impl VBoxManageDriver {
    pub fn new(binary: impl Into<PathBuf>, guest: impl Into<String>, controller: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            guest: guest.into(),
            controller: controller.into(),
        }
    }

    /// 执行 VBoxManage 并返回标准输出
    async fn execute<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        debug!("执行命令: {:?} {:?}", self.binary, args);

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::Hypervisor(format!("Failed to run {:?}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("VBoxManage {:?} 执行失败: {}", args.first(), stderr);
            return Err(Error::Hypervisor(format!(
                "VBoxManage {:?} failed: {}",
                args.first(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl HypervisorDriver for VBoxManageDriver {
    async fn list_disks(&self) -> Result<Vec<ObservedDisk>> {
        let output = self.execute(["list", "hdds"]).await?;
        parse_hdds(&output)
    }

    async fn show_guest_info(&self) -> Result<HashMap<String, String>> {
        let output = self
            .execute(["showvminfo", self.guest.as_str(), "--machinereadable"])
            .await?;
        Ok(parse_machine_readable(&output))
    }

    async fn create_disk(&self, path: &Path, size_bytes: u64, format: &DiskFormat) -> Result<String> {
        info!("创建磁盘: path={:?}, size={}, format={}", path, format_bytes(size_bytes), format);

        let size = size_bytes.to_string();
        let args: [&OsStr; 8] = [
            "createmedium".as_ref(),
            "disk".as_ref(),
            "--filename".as_ref(),
            path.as_os_str(),
            "--sizebyte".as_ref(),
            size.as_ref(),
            "--format".as_ref(),
            format.as_str().as_ref(),
        ];
        let output = self.execute(args).await?;
        parse_medium_uuid(&output)
    }

    async fn attach_disk(&self, slot: Slot, path: &Path, kind: MediumKind) -> Result<()> {
        info!("挂载磁盘 {:?} 到 {} 的 {}", path, self.controller, slot);

        let port = slot.port.to_string();
        let device = slot.device.to_string();
        let args: [&OsStr; 12] = [
            "storageattach".as_ref(),
            self.guest.as_ref(),
            "--storagectl".as_ref(),
            self.controller.as_ref(),
            "--port".as_ref(),
            port.as_ref(),
            "--device".as_ref(),
            device.as_ref(),
            "--type".as_ref(),
            kind.as_str().as_ref(),
            "--medium".as_ref(),
            path.as_os_str(),
        ];
        self.execute(args).await?;
        Ok(())
    }

    async fn resize_disk(&self, path: &Path, size_bytes: u64) -> Result<()> {
        info!("扩容磁盘 {:?} 到 {}", path, format_bytes(size_bytes));

        let size = size_bytes.to_string();
        let args: [&OsStr; 5] = [
            "modifymedium".as_ref(),
            "disk".as_ref(),
            path.as_os_str(),
            "--resizebyte".as_ref(),
            size.as_ref(),
        ];
        self.execute(args).await?;
        Ok(())
    }

    async fn remove_disk(&self, slot: Slot) -> Result<()> {
        info!("卸载 {} 上 {} 的介质", self.controller, slot);

        let port = slot.port.to_string();
        let device = slot.device.to_string();
        self.execute([
            "storageattach",
            self.guest.as_str(),
            "--storagectl",
            self.controller.as_str(),
            "--port",
            port.as_str(),
            "--device",
            device.as_str(),
            "--medium",
            "none",
        ])
        .await?;
        Ok(())
    }

    async fn close_medium(&self, medium: &str) -> Result<()> {
        info!("释放介质 {}", medium);

        self.execute(["closemedium", "disk", medium, "--delete"]).await?;
        Ok(())
    }

    async fn clone_disk(&self, source: &Path, dest: &Path, format: &DiskFormat) -> Result<()> {
        info!("克隆磁盘 {:?} 到 {:?}，格式 {}", source, dest, format);

        let args: [&OsStr; 6] = [
            "clonemedium".as_ref(),
            "disk".as_ref(),
            source.as_os_str(),
            dest.as_os_str(),
            "--format".as_ref(),
            format.as_str().as_ref(),
        ];
        self.execute(args).await?;
        Ok(())
    }

    fn controller(&self) -> &str {
        &self.controller
    }

    fn driver_type(&self) -> &str {
        "virtualbox"
    }
}

/// 解析 `list hdds` 输出，每个磁盘一段，段之间空行分隔
pub fn parse_hdds(output: &str) -> Result<Vec<ObservedDisk>> {
    let mut disks = Vec::new();
    let mut block: HashMap<&str, &str> = HashMap::new();

    for line in output.lines().chain(std::iter::once("")) {
        if line.trim().is_empty() {
            if !block.is_empty() {
                disks.push(observed_from_block(&block)?);
                block.clear();
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            block.insert(key.trim(), value.trim());
        }
    }

    Ok(disks)
}

fn observed_from_block(block: &HashMap<&str, &str>) -> Result<ObservedDisk> {
    let field = |name: &str| {
        block
            .get(name)
            .copied()
            .ok_or_else(|| Error::Hypervisor(format!("Disk entry without {}: {:?}", name, block)))
    };

    let location = PathBuf::from(field("Location")?);
    let name = location
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::Hypervisor(format!("Invalid disk location: {:?}", location)))?;

    Ok(ObservedDisk {
        uuid: field("UUID")?.to_string(),
        name,
        location,
        capacity: field("Capacity")?.to_string(),
        storage_format: field("Storage format")?.parse()?,
    })
}

/// 解析 `--machinereadable` 输出的 key="value" 行
pub fn parse_machine_readable(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (unquote(key).to_string(), unquote(value).to_string()))
        .collect()
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

/// 从 createmedium 输出中提取 UUID
pub fn parse_medium_uuid(output: &str) -> Result<String> {
    output
        .lines()
        .find_map(|line| line.split_once("UUID:"))
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .map(|uuid| uuid.to_string())
        .ok_or_else(|| Error::Hypervisor(format!("No UUID in createmedium output: {}", output.trim())))
}

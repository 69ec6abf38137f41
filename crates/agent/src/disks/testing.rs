/// 测试用的内存 hypervisor
/// 
/// 记录每一次调用，按 VirtualBox 的行为维护磁盘列表和槽位绑定

use async_trait::async_trait;
use common::models::constants::DEFAULT_CONTROLLER;
use common::models::{DiskFormat, ObservedDisk};
use common::utils::{bytes_to_whole_megabytes, generate_id};
use common::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::hypervisor::{HypervisorDriver, MediumKind, Slot};

pub const GUEST_FOLDER: &str = "/vms/guest";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListDisks,
    ShowGuestInfo,
    CreateDisk { path: PathBuf, size_bytes: u64, format: DiskFormat },
    AttachDisk { slot: Slot, path: PathBuf },
    ResizeDisk { path: PathBuf, size_bytes: u64 },
    RemoveDisk { slot: Slot },
    CloseMedium { medium: String },
    CloneDisk { source: PathBuf, dest: PathBuf, format: DiskFormat },
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::ListDisks | Call::ShowGuestInfo)
    }

    fn op(&self) -> &'static str {
        match self {
            Call::ListDisks => "list_disks",
            Call::ShowGuestInfo => "show_guest_info",
            Call::CreateDisk { .. } => "create_disk",
            Call::AttachDisk { .. } => "attach_disk",
            Call::ResizeDisk { .. } => "resize_disk",
            Call::RemoveDisk { .. } => "remove_disk",
            Call::CloseMedium { .. } => "close_medium",
            Call::CloneDisk { .. } => "clone_disk",
        }
    }
}

#[derive(Default)]
struct State {
    disks: Vec<ObservedDisk>,
    attachments: BTreeMap<Slot, String>,
    calls: Vec<Call>,
    fail_on: Option<&'static str>,
}

impl State {
    fn disk_at(&self, path: &Path) -> Option<usize> {
        self.disks.iter().position(|d| d.location == path)
    }
}

pub struct FakeHypervisor {
    state: Mutex<State>,
}

impl FakeHypervisor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// 添加一块已存在的磁盘
    pub fn with_disk(self, uuid: &str, file: &str, capacity_mb: u64, format: DiskFormat) -> Self {
        let location = Path::new(GUEST_FOLDER).join(file);
        let name = location.file_stem().unwrap().to_string_lossy().into_owned();
        self.state.lock().unwrap().disks.push(ObservedDisk {
            uuid: uuid.to_string(),
            name,
            location,
            capacity: format!("{} MBytes", capacity_mb),
            storage_format: format,
        });
        self
    }

    /// 把已存在的磁盘绑定到槽位
    pub fn with_attachment(self, port: u32, uuid: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .attachments
            .insert(Slot::new(port, 0), uuid.to_string());
        self
    }

    /// 让指定操作返回错误
    pub fn fail_on(&self, op: &'static str) {
        self.state.lock().unwrap().fail_on = Some(op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn disks(&self) -> Vec<ObservedDisk> {
        self.state.lock().unwrap().disks.clone()
    }

    pub fn attachments(&self) -> BTreeMap<Slot, String> {
        self.state.lock().unwrap().attachments.clone()
    }

    fn record<T>(&self, call: Call, apply: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock().unwrap();
        let op = call.op();
        state.calls.push(call);
        if state.fail_on == Some(op) {
            return Err(Error::Hypervisor(format!("{} failed", op)));
        }
        apply(&mut state)
    }
}

#[async_trait]
impl HypervisorDriver for FakeHypervisor {
    async fn list_disks(&self) -> Result<Vec<ObservedDisk>> {
        self.record(Call::ListDisks, |state| Ok(state.disks.clone()))
    }

    async fn show_guest_info(&self) -> Result<HashMap<String, String>> {
        self.record(Call::ShowGuestInfo, |state| {
            let mut info = HashMap::new();
            info.insert("CfgFile".to_string(), format!("{}/guest.vbox", GUEST_FOLDER));
            for (slot, uuid) in &state.attachments {
                info.insert(
                    format!("{}-ImageUUID-{}-{}", DEFAULT_CONTROLLER, slot.port, slot.device),
                    uuid.clone(),
                );
            }
            Ok(info)
        })
    }

    async fn create_disk(&self, path: &Path, size_bytes: u64, format: &DiskFormat) -> Result<String> {
        let call = Call::CreateDisk {
            path: path.to_path_buf(),
            size_bytes,
            format: format.clone(),
        };
        self.record(call, |state| {
            if state.disk_at(path).is_some() {
                return Err(Error::Hypervisor(format!("{:?} already exists", path)));
            }
            let uuid = generate_id();
            state.disks.push(ObservedDisk {
                uuid: uuid.clone(),
                name: path.file_stem().unwrap().to_string_lossy().into_owned(),
                location: path.to_path_buf(),
                capacity: format!("{} MBytes", bytes_to_whole_megabytes(size_bytes)),
                storage_format: format.clone(),
            });
            Ok(uuid)
        })
    }

    async fn attach_disk(&self, slot: Slot, path: &Path, kind: MediumKind) -> Result<()> {
        assert_eq!(kind, MediumKind::Hdd);
        let call = Call::AttachDisk { slot, path: path.to_path_buf() };
        self.record(call, |state| {
            let index = state
                .disk_at(path)
                .ok_or_else(|| Error::NotFound(format!("{:?}", path)))?;
            if state.attachments.contains_key(&slot) {
                return Err(Error::Hypervisor(format!("{} is occupied", slot)));
            }
            let uuid = state.disks[index].uuid.clone();
            state.attachments.insert(slot, uuid);
            Ok(())
        })
    }

    async fn resize_disk(&self, path: &Path, size_bytes: u64) -> Result<()> {
        let call = Call::ResizeDisk { path: path.to_path_buf(), size_bytes };
        self.record(call, |state| {
            let index = state
                .disk_at(path)
                .ok_or_else(|| Error::NotFound(format!("{:?}", path)))?;
            let disk = &mut state.disks[index];
            if !disk.storage_format.is_resizable() {
                return Err(Error::Hypervisor(format!("cannot resize {}", disk.storage_format)));
            }
            disk.capacity = format!("{} MBytes", bytes_to_whole_megabytes(size_bytes));
            Ok(())
        })
    }

    async fn remove_disk(&self, slot: Slot) -> Result<()> {
        self.record(Call::RemoveDisk { slot }, |state| {
            state
                .attachments
                .remove(&slot)
                .map(|_| ())
                .ok_or_else(|| Error::Hypervisor(format!("nothing attached at {}", slot)))
        })
    }

    async fn close_medium(&self, medium: &str) -> Result<()> {
        let call = Call::CloseMedium { medium: medium.to_string() };
        self.record(call, |state| {
            let index = state
                .disks
                .iter()
                .position(|d| d.uuid == medium || d.location == Path::new(medium))
                .ok_or_else(|| Error::NotFound(medium.to_string()))?;
            let uuid = &state.disks[index].uuid;
            if state.attachments.values().any(|bound| bound == uuid) {
                return Err(Error::Hypervisor(format!("{} is still attached", medium)));
            }
            state.disks.remove(index);
            Ok(())
        })
    }

    async fn clone_disk(&self, source: &Path, dest: &Path, format: &DiskFormat) -> Result<()> {
        let call = Call::CloneDisk {
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
            format: format.clone(),
        };
        self.record(call, |state| {
            let index = state
                .disk_at(source)
                .ok_or_else(|| Error::NotFound(format!("{:?}", source)))?;
            if state.disk_at(dest).is_some() {
                return Err(Error::Hypervisor(format!("{:?} already exists", dest)));
            }
            let clone = ObservedDisk {
                uuid: generate_id(),
                name: dest.file_stem().unwrap().to_string_lossy().into_owned(),
                location: dest.to_path_buf(),
                capacity: state.disks[index].capacity.clone(),
                storage_format: format.clone(),
            };
            state.disks.push(clone);
            Ok(())
        })
    }

    fn controller(&self) -> &str {
        DEFAULT_CONTROLLER
    }

    fn driver_type(&self) -> &str {
        "fake"
    }
}

/// 虚拟化驱动
/// 
/// 与 hypervisor 命令行交互，并把原始输出解析为类型化结构

pub mod attachment;
pub mod driver;
pub mod vbox;

pub use attachment::{AttachmentKey, AttachmentMap, GuestInfo, Slot};
pub use driver::{HypervisorDriver, MediumKind};
pub use vbox::VBoxManageDriver;

//! Backup item actions

mod datavolume;
mod pod;
mod pvc;
mod vm;
mod vmi;
mod volumesnapshot;

pub use datavolume::DataVolumeBackupAction;
pub use pod::PodBackupAction;
pub use pvc::PvcBackupAction;
pub use vm::VmBackupAction;
pub use vmi::VmiBackupAction;
pub use volumesnapshot::VolumeSnapshotBackupAction;

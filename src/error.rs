//! Host-facing error types. Guest-triggered conditions (bus faults, illegal
//! opcodes, zero divides) never reach this layer — they vector into the
//! guest's own exception handler instead, per the architecture each
//! processor emulates. Only asset-load and host-API boundaries use these.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IPL image must be exactly {expected:#x} bytes, got {got:#x}")]
    WrongIplSize { expected: usize, got: usize },
    #[error("disc image format not recognized")]
    UnknownDiscFormat,
    #[error("backup memory image size {0:#x} is not one of the supported sizes")]
    InvalidBackupSize(usize),
}

/// Failure modes for reading a backup-memory image off the host; success
/// carries the populated `BackupMemory` itself, via `Result`'s `Ok` arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupLoadResult {
    FilesystemError,
    InvalidSize,
}

/// Result of importing a single file into a backup-memory volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportResult {
    Imported,
    Overwritten,
    FileExists,
    NoSpace,
}

/// A malformed backup-memory file or volume rejected at the import boundary.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BackupFileError {
    #[error("backup volume filesystem is inconsistent")]
    FilesystemError,
    #[error("backup file is truncated")]
    FileTruncated,
    #[error("backup file magic does not match a known format")]
    BadMagic,
}

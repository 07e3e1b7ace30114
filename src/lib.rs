//! Core of a cycle-accurate Sega Saturn emulator: dual SH-2 interpreters,
//! the SCU (with its DSP), the SCSP voice/DSP engine and its embedded
//! MC68EC000, the shared bus fabric, a single-threaded event scheduler,
//! SMPC, and the backup-memory filesystem. The frontend (windowing, input,
//! audio device, disc I/O) lives outside this crate; `emulator::Emulator`
//! is the only surface it talks to.

pub mod backup;
pub mod bus;
pub mod config;
pub mod emulator;
pub mod error;
pub mod m68k;
pub mod scheduler;
pub mod scsp;
pub mod scu;
pub mod sh2;
pub mod smpc;
pub mod tracer;

pub use config::EmulatorConfig;
pub use emulator::Emulator;

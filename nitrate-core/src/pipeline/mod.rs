//! The ingestion-and-processing pipeline: Scanner (C5) → Producer (C6) →
//! Workers (C7), all writing through the Status Manager (C8), plus startup
//! crash recovery and the supervisor that wires them together.

mod producer;
mod recovery;
mod scanner;
mod status;
mod supervisor;
mod worker;

pub use producer::Producer;
pub use recovery::recover;
pub use scanner::Scanner;
pub use status::StatusManager;
pub use supervisor::Supervisor;
pub use worker::Worker;

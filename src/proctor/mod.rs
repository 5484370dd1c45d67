// src/proctor/mod.rs

//! Student-side proctoring: watches the exam surface, counts violations and
//! drives the one submission an attempt is allowed.

pub mod client;
pub mod counter;
pub mod latch;
pub mod monitor;
pub mod session;
pub mod surface;

pub use client::{ClientConfig, HttpExamClient, SubmissionTicket, SubmissionTransport, SubmitError};
pub use monitor::{MonitorConfig, MonitorEffect, MonitorState, ProctorMonitor};
pub use session::{ExamSession, SessionCommand, SessionOutcome, SessionReport};
pub use surface::{ProctorSurface, SurfaceSignal, SurfaceState, VirtualSurface};

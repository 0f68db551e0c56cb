//! Progress reporting for firmware updates.
//!
//! The updater never logs progress on its own behalf; it reports to an
//! [`UpdateObserver`] handed in by the caller. [`LogObserver`] forwards
//! everything to the `log` facade, front ends can render a progress bar.

use std::fmt;

use log::{debug, info};

use crate::protocol::bootloader::FlashState;

/// When a firmware version was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStage {
    /// Before the bootloader was entered.
    BeforeUpdate,
    /// After the update was finalized and the module restarted.
    AfterUpdate,
}

impl fmt::Display for VersionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeUpdate => write!(f, "before update"),
            Self::AfterUpdate => write!(f, "after update"),
        }
    }
}

/// Receiver of update progress.
pub trait UpdateObserver {
    /// A chunk was acknowledged: `written` of `total` chunks are on the device.
    fn report_progress(&mut self, written: usize, total: usize);

    /// A firmware version string was read from the module.
    fn report_version(&mut self, stage: VersionStage, version: &str);

    /// The bootloader state machine moved to `state`.
    fn report_state(&mut self, state: &FlashState) {
        let _ = state;
    }
}

impl<O: UpdateObserver + ?Sized> UpdateObserver for &mut O {
    fn report_progress(&mut self, written: usize, total: usize) {
        (**self).report_progress(written, total);
    }

    fn report_version(&mut self, stage: VersionStage, version: &str) {
        (**self).report_version(stage, version);
    }

    fn report_state(&mut self, state: &FlashState) {
        (**self).report_state(state);
    }
}

/// Observer that writes progress to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl UpdateObserver for LogObserver {
    fn report_progress(&mut self, written: usize, total: usize) {
        info!("Wrote chunk {written}/{total}.");
    }

    fn report_version(&mut self, stage: VersionStage, version: &str) {
        info!("Version {stage}: {version}");
    }

    fn report_state(&mut self, state: &FlashState) {
        debug!("Bootloader state: {state:?}");
    }
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl UpdateObserver for NullObserver {
    fn report_progress(&mut self, _written: usize, _total: usize) {}

    fn report_version(&mut self, _stage: VersionStage, _version: &str) {}
}

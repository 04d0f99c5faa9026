//! Hosting signals consumed by the single-writer gate.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Elected "main" process of a multi-process deployment. Only the main process may
/// write indexes. The signal is trusted as given.
pub trait MainDom: Send + Sync {
    fn is_main_dom(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum RuntimeLevel {
    Unknown = 0,
    Boot = 1,
    Install = 2,
    Upgrade = 3,
    Run = 4,
}

impl RuntimeLevel {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RuntimeLevel::Boot,
            2 => RuntimeLevel::Install,
            3 => RuntimeLevel::Upgrade,
            4 => RuntimeLevel::Run,
            _ => RuntimeLevel::Unknown,
        }
    }
}

pub trait RuntimeState: Send + Sync {
    fn level(&self) -> RuntimeLevel;
}

/// Main-process flag set by the host.
#[derive(Debug, Default)]
pub struct MainDomFlag(AtomicBool);

impl MainDomFlag {
    pub fn new(is_main: bool) -> Self {
        Self(AtomicBool::new(is_main))
    }

    pub fn set(&self, is_main: bool) {
        self.0.store(is_main, Ordering::SeqCst);
    }
}

impl MainDom for MainDomFlag {
    fn is_main_dom(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runtime level set by the host as boot progresses.
#[derive(Debug)]
pub struct RuntimeLevelState(AtomicU8);

impl RuntimeLevelState {
    pub fn new(level: RuntimeLevel) -> Self {
        Self(AtomicU8::new(level as u8))
    }

    pub fn set(&self, level: RuntimeLevel) {
        self.0.store(level as u8, Ordering::SeqCst);
    }
}

impl Default for RuntimeLevelState {
    fn default() -> Self {
        Self::new(RuntimeLevel::Unknown)
    }
}

impl RuntimeState for RuntimeLevelState {
    fn level(&self) -> RuntimeLevel {
        RuntimeLevel::from_u8(self.0.load(Ordering::SeqCst))
    }
}

use std::sync::Arc;

use parking_lot::Mutex;
use ssegui::input::NativeResult;
use ssegui::{CooperativeDevice, RawHandle};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[allow(unused)]
pub fn setup_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer().with_thread_names(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .try_init()
        .ok();
}

#[allow(unused)]
pub fn handle(addr: usize) -> Option<RawHandle> {
    RawHandle::from_addr(addr)
}

/// A device call, as seen by [`MockDevice`].
#[allow(unused)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Unacquire,
    SetCooperativeLevel(Option<RawHandle>, u32),
    SetDataFormat(Option<RawHandle>),
    Acquire,
}

/// Records every call and fails `SetCooperativeLevel` on demand.
#[derive(Default)]
pub struct MockDevice {
    pub calls: Mutex<Vec<Call>>,
    pub fail_level: Mutex<Option<i32>>,
}

#[allow(unused)]
impl MockDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock())
    }
}

impl CooperativeDevice for MockDevice {
    fn unacquire(&self) -> NativeResult {
        self.calls.lock().push(Call::Unacquire);
        Ok(())
    }

    fn set_cooperative_level(&self, window: Option<RawHandle>, flags: u32) -> NativeResult {
        self.calls.lock().push(Call::SetCooperativeLevel(window, flags));
        match *self.fail_level.lock() {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn set_data_format(&self, format: Option<RawHandle>) -> NativeResult {
        self.calls.lock().push(Call::SetDataFormat(format));
        Ok(())
    }

    fn acquire(&self) -> NativeResult {
        self.calls.lock().push(Call::Acquire);
        Ok(())
    }
}

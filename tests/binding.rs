mod common;

use std::ffi::c_void;
use std::ptr::null_mut;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{handle, setup_tracing};
use ssegui::render::{PARAM_CHAIN, PARAM_CONTEXT, PARAM_DEVICE, PARAM_WINDOW};
use ssegui::{Error, Ssegui};

const WINDOW: usize = 0x10;
const LAUNCHER: usize = 0x20;

fn record_devices(ssegui: &Ssegui) {
    let render = ssegui.render();
    assert!(render.on_device_created(handle(LAUNCHER), handle(0x100), handle(0x101), handle(0x102)));
    assert!(render.on_device_created(handle(WINDOW), handle(0x200), handle(0x201), handle(0x202)));
    // A second device on the same window is recorded but never bound.
    assert!(render.on_device_created(handle(WINDOW), handle(0x300), handle(0x301), handle(0x302)));
    // Incomplete records are dropped.
    assert!(!render.on_device_created(handle(WINDOW), None, handle(0x401), handle(0x402)));
    assert_eq!(render.history().len(), 3);
}

#[test]
fn test_bind_adopts_first_device_of_the_game_window() {
    setup_tracing();

    let ssegui = Ssegui::new();
    record_devices(&ssegui);
    assert!(ssegui.parameter(PARAM_DEVICE).is_none());

    let record = ssegui.render().bind(handle(WINDOW), handle(WINDOW)).unwrap();
    assert_eq!(record.device, handle(0x200).unwrap());

    assert_eq!(ssegui.parameter(PARAM_DEVICE), handle(0x200));
    assert_eq!(ssegui.parameter(PARAM_CONTEXT), handle(0x201));
    assert_eq!(ssegui.parameter(PARAM_CHAIN), handle(0x202));
    assert_eq!(ssegui.parameter(PARAM_WINDOW), handle(WINDOW));
    assert_eq!(ssegui.parameter("ID3D12Device"), None);
    assert_eq!(ssegui.parameter("id3d11device"), None);
}

#[test]
fn test_concurrent_device_records_are_kept() {
    const THREADS: usize = 8;
    const DEVICES: usize = 1000;

    let ssegui = Ssegui::new();
    std::thread::scope(|scope| {
        for thread in 0..THREADS {
            let render = ssegui.render();
            scope.spawn(move || {
                for device in 0..DEVICES {
                    let base = 0x1000 * (thread + 1) + device * 4 + 0x10_0000;
                    assert!(render.on_device_created(
                        handle(WINDOW),
                        handle(base),
                        handle(base + 1),
                        handle(base + 2),
                    ));
                }
            });
        }
    });

    assert_eq!(ssegui.render().history().len(), THREADS * DEVICES);
}

#[test]
fn test_bind_requires_matching_windows() {
    let ssegui = Ssegui::new();
    record_devices(&ssegui);

    let mismatched = ssegui.render().bind(handle(LAUNCHER), handle(WINDOW));
    assert!(matches!(mismatched, Err(Error::HostNotFound)));
    assert!(matches!(ssegui.render().bind(None, handle(WINDOW)), Err(Error::HostNotFound)));
    assert!(matches!(ssegui.render().bind(handle(0x30), handle(0x30)), Err(Error::HostNotFound)));
    assert!(ssegui.render().target().is_none());
}

static FRAMES: AtomicUsize = AtomicUsize::new(0);

extern "C" fn on_frame(_chain: *mut c_void, _sync_interval: u32, _flags: u32) {
    FRAMES.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn test_frames_reach_listeners_once_enabled() {
    let ssegui = Ssegui::new();
    let render = ssegui.render();
    assert!(ssegui.render_listener(on_frame, false));
    assert!(!ssegui.render_listener(on_frame, false));

    render.on_present(null_mut(), 1, 0);
    assert_eq!(FRAMES.load(Ordering::SeqCst), 0);

    assert!(!render.enable_rendering(Some(true)));
    render.on_present(null_mut(), 1, 0);
    render.on_present(null_mut(), 1, 0);
    assert_eq!(FRAMES.load(Ordering::SeqCst), 2);

    render.unbind();
    render.on_present(null_mut(), 1, 0);
    assert_eq!(FRAMES.load(Ordering::SeqCst), 2);
}

static MESSAGES: AtomicUsize = AtomicUsize::new(0);

extern "C" fn on_window_message(_hwnd: *mut c_void, _msg: u32, _wparam: usize, _lparam: isize) -> isize {
    MESSAGES.fetch_add(1, Ordering::SeqCst);
    0
}

#[test]
fn test_messages_are_blocked_per_channel() {
    const WM_KEYDOWN: u32 = 0x0100;
    const WM_MOUSEMOVE: u32 = 0x0200;
    const WM_LBUTTONDOWN: u32 = 0x0201;
    const WM_SIZE: u32 = 0x0005;

    let ssegui = Ssegui::new();
    assert!(ssegui.message_listener(on_window_message, false));
    ssegui.render().enable_messaging(Some(true));

    assert!(!ssegui.on_message(null_mut(), WM_KEYDOWN, 0, 0));
    assert!(!ssegui.on_message(null_mut(), WM_MOUSEMOVE, 0, 0));

    ssegui.enable_input(Some(false), None);
    assert!(ssegui.on_message(null_mut(), WM_KEYDOWN, 0, 0));
    assert!(!ssegui.on_message(null_mut(), WM_MOUSEMOVE, 0, 0));

    ssegui.enable_input(Some(true), Some(false));
    assert!(!ssegui.on_message(null_mut(), WM_KEYDOWN, 0, 0));
    assert!(ssegui.on_message(null_mut(), WM_LBUTTONDOWN, 0, 0));
    // Cursor movement keeps reaching the game so it can track the pointer.
    assert!(!ssegui.on_message(null_mut(), WM_MOUSEMOVE, 0, 0));
    assert!(!ssegui.on_message(null_mut(), WM_SIZE, 0, 0));

    // Listeners see every message, blocked or not.
    assert_eq!(MESSAGES.load(Ordering::SeqCst), 8);
}

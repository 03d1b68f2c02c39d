//! Hooks for DirectX 11.

use std::ffi::c_void;
use std::mem;
use std::ptr::null_mut;
use std::sync::atomic::{AtomicIsize, AtomicPtr, Ordering};

use tracing::{debug, error, info, trace};
use windows::core::{Interface, HRESULT, HSTRING, PCWSTR};
use windows::Win32::Foundation::{BOOL, E_FAIL, HMODULE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Direct3D::{D3D_DRIVER_TYPE, D3D_FEATURE_LEVEL};
use windows::Win32::Graphics::Direct3D11::D3D11_CREATE_DEVICE_FLAG;
use windows::Win32::Graphics::Dxgi::{IDXGISwapChain, DXGI_SWAP_CHAIN_DESC};
use windows::Win32::System::Threading::GetCurrentProcessId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallWindowProcW, DefWindowProcW, EnumWindows, FindWindowW, GetWindow,
    GetWindowThreadProcessId, IsWindowVisible, SetWindowLongPtrW, GWLP_WNDPROC, GW_OWNER, WNDPROC,
};

use super::original;
use crate::detour::Detours;
use crate::error::{Error, Result};
use crate::render::HOST_WINDOW_TITLE;
use crate::util::{self, RawHandle, PRESENT_VTABLE_SLOT};
use crate::Ssegui;

/// Detour target of the device creation function.
pub const CREATE_DEVICE_TARGET: &str = "D3D11CreateDeviceAndSwapChain@d3d11.dll";
/// Name under which `IDXGISwapChain::Present` is detoured.
pub const PRESENT_NAME: &str = "IDXGISwapChain::Present";

type D3D11CreateDeviceAndSwapChainType = unsafe extern "system" fn(
    adapter: *mut c_void,
    driver_type: D3D_DRIVER_TYPE,
    software: HMODULE,
    flags: D3D11_CREATE_DEVICE_FLAG,
    feature_levels: *const D3D_FEATURE_LEVEL,
    num_feature_levels: u32,
    sdk_version: u32,
    swap_chain_desc: *const DXGI_SWAP_CHAIN_DESC,
    swap_chain: *mut *mut c_void,
    device: *mut *mut c_void,
    feature_level: *mut D3D_FEATURE_LEVEL,
    immediate_context: *mut *mut c_void,
) -> HRESULT;

type DXGISwapChainPresentType =
    unsafe extern "system" fn(swap_chain: *mut c_void, sync_interval: u32, flags: u32) -> HRESULT;

static CREATE_DEVICE: AtomicPtr<c_void> = AtomicPtr::new(null_mut());
static PRESENT: AtomicPtr<c_void> = AtomicPtr::new(null_mut());
static WND_PROC: AtomicIsize = AtomicIsize::new(0);
static WINDOW: AtomicIsize = AtomicIsize::new(0);

unsafe fn out_param(ptr: *mut *mut c_void) -> Option<RawHandle> {
    if ptr.is_null() {
        None
    } else {
        RawHandle::new(*ptr)
    }
}

#[allow(clippy::too_many_arguments)]
unsafe extern "system" fn d3d11_create_device_and_swap_chain_impl(
    adapter: *mut c_void,
    driver_type: D3D_DRIVER_TYPE,
    software: HMODULE,
    flags: D3D11_CREATE_DEVICE_FLAG,
    feature_levels: *const D3D_FEATURE_LEVEL,
    num_feature_levels: u32,
    sdk_version: u32,
    swap_chain_desc: *const DXGI_SWAP_CHAIN_DESC,
    swap_chain: *mut *mut c_void,
    device: *mut *mut c_void,
    feature_level: *mut D3D_FEATURE_LEVEL,
    immediate_context: *mut *mut c_void,
) -> HRESULT {
    let Some(create_device) = original::<D3D11CreateDeviceAndSwapChainType>(&CREATE_DEVICE)
    else {
        error!("D3D11CreateDeviceAndSwapChain trampoline uninitialized");
        return E_FAIL;
    };

    let hr = create_device(
        adapter,
        driver_type,
        software,
        flags,
        feature_levels,
        num_feature_levels,
        sdk_version,
        swap_chain_desc,
        swap_chain,
        device,
        feature_level,
        immediate_context,
    );

    if hr.is_ok() {
        let window = swap_chain_desc
            .as_ref()
            .and_then(|desc| RawHandle::from_addr(desc.OutputWindow.0 as usize));
        Ssegui::global().render().on_device_created(
            window,
            out_param(device),
            out_param(immediate_context),
            out_param(swap_chain),
        );
    }

    hr
}

unsafe extern "system" fn dxgi_swap_chain_present_impl(
    swap_chain: *mut c_void,
    sync_interval: u32,
    flags: u32,
) -> HRESULT {
    let Some(present) = original::<DXGISwapChainPresentType>(&PRESENT) else {
        error!("IDXGISwapChain::Present trampoline uninitialized");
        return E_FAIL;
    };

    Ssegui::global().render().on_present(swap_chain, sync_interval, flags);

    trace!("Call IDXGISwapChain::Present trampoline");
    present(swap_chain, sync_interval, flags)
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if Ssegui::global().on_message(hwnd.0 as *mut c_void, msg, wparam.0, lparam.0) {
        return LRESULT(0);
    }

    match WND_PROC.load(Ordering::SeqCst) {
        0 => DefWindowProcW(hwnd, msg, wparam, lparam),
        wnd_proc => {
            let wnd_proc = mem::transmute::<isize, WNDPROC>(wnd_proc);
            CallWindowProcW(wnd_proc, hwnd, msg, wparam, lparam)
        },
    }
}

unsafe extern "system" fn find_top_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let mut pid = 0u32;
    GetWindowThreadProcessId(hwnd, Some(&mut pid));

    if pid != GetCurrentProcessId()
        || GetWindow(hwnd, GW_OWNER).0 != 0
        || !IsWindowVisible(hwnd).as_bool()
    {
        return BOOL(1);
    }

    *(lparam.0 as *mut HWND) = hwnd;
    BOOL(0)
}

/// The visible, unowned top level window of this process.
fn top_window() -> Option<RawHandle> {
    let mut hwnd = HWND(0);
    // Stopping the enumeration early reports an error, which is expected.
    let _ = unsafe { EnumWindows(Some(find_top_window), LPARAM(&mut hwnd as *mut HWND as isize)) };
    RawHandle::from_addr(hwnd.0 as usize)
}

/// The window titled [`HOST_WINDOW_TITLE`].
fn named_window() -> Option<RawHandle> {
    let title = HSTRING::from(HOST_WINDOW_TITLE);
    let hwnd = unsafe { FindWindowW(PCWSTR::null(), &title) };
    RawHandle::from_addr(hwnd.0 as usize)
}

/// Route `hwnd` through [`window_proc`]. A window subclassed earlier gets its
/// own procedure back first.
unsafe fn subclass(hwnd: HWND) {
    let previous = WINDOW.swap(hwnd.0, Ordering::SeqCst);
    if previous == hwnd.0 {
        return;
    }

    let old_proc = WND_PROC.swap(0, Ordering::SeqCst);
    if previous != 0 && old_proc != 0 {
        SetWindowLongPtrW(HWND(previous), GWLP_WNDPROC, old_proc);
        debug!("Window {previous:#x} unsubclassed");
    }

    let wnd_proc = SetWindowLongPtrW(hwnd, GWLP_WNDPROC, window_proc as usize as isize);
    WND_PROC.store(wnd_proc, Ordering::SeqCst);
}

/// Detour `D3D11CreateDeviceAndSwapChain`.
///
/// # Safety
///
/// Patches code in `d3d11.dll`.
pub unsafe fn install(detours: &dyn Detours) -> Result<()> {
    detours.detour(
        CREATE_DEVICE_TARGET,
        d3d11_create_device_and_swap_chain_impl as *const c_void,
        &CREATE_DEVICE,
    )
}

/// Adopt the game's device, detour its `Present` and subclass its window.
///
/// # Safety
///
/// The recorded swap chain must still be alive.
pub unsafe fn bind(ssegui: &Ssegui, detours: &dyn Detours) -> Result<()> {
    let record = ssegui.render().bind(top_window(), named_window())?;

    let chain = record.chain.as_ptr();
    if let Some(swap_chain) = IDXGISwapChain::from_raw_borrowed(&chain) {
        if let Ok(desc) = util::try_out_param(|d| swap_chain.GetDesc(d)) {
            debug!("Swap chain {}x{}", desc.BufferDesc.Width, desc.BufferDesc.Height);
        }
    }

    if PRESENT.load(Ordering::SeqCst).is_null() {
        let present = util::vtable_entry(record.chain, PRESENT_VTABLE_SLOT)
            .ok_or(Error::NullInterface(PRESENT_NAME))?;
        debug!("{PRESENT_NAME} = {present:?}");
        detours.detour_address(
            PRESENT_NAME,
            present.as_ptr(),
            dxgi_swap_chain_present_impl as *const c_void,
            &PRESENT,
        )?;
    }

    subclass(HWND(record.window.addr() as isize));

    info!("{PRESENT_NAME} hooked and window subclassed.");
    Ok(())
}

/// Restore the window procedure and remove both detours.
///
/// # Safety
///
/// Patches code in `d3d11.dll` and `dxgi.dll`.
pub unsafe fn unbind(ssegui: &Ssegui, detours: &dyn Detours) -> Result<()> {
    ssegui.render().unbind();

    let hwnd = WINDOW.swap(0, Ordering::SeqCst);
    let wnd_proc = WND_PROC.swap(0, Ordering::SeqCst);
    if hwnd != 0 && wnd_proc != 0 {
        SetWindowLongPtrW(HWND(hwnd), GWLP_WNDPROC, wnd_proc);
    }

    let present = super::restore(detours, PRESENT_NAME, &PRESENT);
    let create_device = super::restore(detours, CREATE_DEVICE_TARGET, &CREATE_DEVICE);

    present.and(create_device)
}

#[cfg(test)]
mod tests {
    use windows::core::w;
    use windows::Win32::Foundation::HINSTANCE;
    use windows::Win32::UI::WindowsAndMessaging::{
        CreateWindowExW, DestroyWindow, GetWindowLongPtrW, HMENU, WINDOW_EX_STYLE, WS_OVERLAPPED,
    };

    use super::*;

    unsafe fn static_window() -> HWND {
        CreateWindowExW(
            WINDOW_EX_STYLE(0),
            w!("STATIC"),
            w!("ssegui subclass"),
            WS_OVERLAPPED,
            0,
            0,
            64,
            64,
            HWND(0),
            HMENU(0),
            HINSTANCE(0),
            None,
        )
    }

    #[test]
    fn subclassing_a_new_window_restores_the_previous_one() {
        unsafe {
            let first = static_window();
            let second = static_window();
            assert_ne!(first.0, 0);
            assert_ne!(second.0, 0);

            let first_proc = GetWindowLongPtrW(first, GWLP_WNDPROC);
            let second_proc = GetWindowLongPtrW(second, GWLP_WNDPROC);
            let hooked = window_proc as usize as isize;

            subclass(first);
            assert_eq!(GetWindowLongPtrW(first, GWLP_WNDPROC), hooked);

            subclass(second);
            assert_eq!(GetWindowLongPtrW(first, GWLP_WNDPROC), first_proc);
            assert_eq!(GetWindowLongPtrW(second, GWLP_WNDPROC), hooked);
            assert_eq!(WND_PROC.load(Ordering::SeqCst), second_proc);

            subclass(second);
            assert_eq!(WND_PROC.load(Ordering::SeqCst), second_proc);

            SetWindowLongPtrW(second, GWLP_WNDPROC, WND_PROC.swap(0, Ordering::SeqCst));
            WINDOW.store(0, Ordering::SeqCst);
            DestroyWindow(first).unwrap();
            DestroyWindow(second).unwrap();
        }
    }
}

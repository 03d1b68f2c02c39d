//! This module contains logic for filtering windows messages.

use bitflags::bitflags;

// Win32 message identifiers, as documented in WinUser.h.
const WM_KEYDOWN: u32 = 0x0100;
const WM_KEYUP: u32 = 0x0101;
const WM_CHAR: u32 = 0x0102;
const WM_LBUTTONDOWN: u32 = 0x0201;
const WM_LBUTTONUP: u32 = 0x0202;
const WM_LBUTTONDBLCLK: u32 = 0x0203;
const WM_RBUTTONDOWN: u32 = 0x0204;
const WM_RBUTTONUP: u32 = 0x0205;
const WM_RBUTTONDBLCLK: u32 = 0x0206;
const WM_MBUTTONDOWN: u32 = 0x0207;
const WM_MBUTTONUP: u32 = 0x0208;
const WM_MBUTTONDBLCLK: u32 = 0x0209;
const WM_MOUSEWHEEL: u32 = 0x020A;
const WM_XBUTTONDOWN: u32 = 0x020B;
const WM_XBUTTONUP: u32 = 0x020C;
const WM_XBUTTONDBLCLK: u32 = 0x020D;
const WM_MOUSEHWHEEL: u32 = 0x020E;

bitflags! {
    /// Bitflag for specifying types of window message to be filtered.
    ///
    /// The active filter follows the capture state: while keyboard capture is
    /// disabled for the host, [`MessageFilter::InputKeyboard`] is set, and
    /// likewise for the mouse. Turning DirectInput off alone does not stop the
    /// OS from delivering the same input as window messages.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MessageFilter: u32 {
        /// Blocks key down/up and character messages.
        const InputKeyboard = 1u32 << 0;
        /// Blocks mouse button and wheel messages.
        const InputMouse = 1u32 << 1;

        /// Blocks all of the above.
        const InputAll = Self::InputKeyboard.bits() | Self::InputMouse.bits();
    }
}

impl MessageFilter {
    /// Build the filter from the host-side capture flags.
    pub fn from_capture(keyboard_enabled: bool, mouse_enabled: bool) -> Self {
        let mut filter = MessageFilter::empty();
        filter.set(MessageFilter::InputKeyboard, !keyboard_enabled);
        filter.set(MessageFilter::InputMouse, !mouse_enabled);
        filter
    }

    /// Check whether the message ID is blocked by this filter
    pub fn is_blocking(&self, message_id: u32) -> bool {
        match message_id {
            WM_KEYDOWN | WM_KEYUP | WM_CHAR => self.contains(Self::InputKeyboard),

            WM_LBUTTONDOWN | WM_LBUTTONUP | WM_LBUTTONDBLCLK | WM_RBUTTONDOWN | WM_RBUTTONUP
            | WM_RBUTTONDBLCLK | WM_MBUTTONDOWN | WM_MBUTTONUP | WM_MBUTTONDBLCLK
            | WM_XBUTTONDOWN | WM_XBUTTONUP | WM_XBUTTONDBLCLK | WM_MOUSEWHEEL
            | WM_MOUSEHWHEEL => self.contains(Self::InputMouse),

            _ => false,
        }
    }
}

/// Overlay hotkeys via a low-level Windows keyboard hook (`WH_KEYBOARD_LL`).
///
/// Two bindings are watched: the in-game toggle and the second-screen toggle.
/// The hook runs on a dedicated OS thread with its own Windows message pump, so
/// it fires even when a full-screen game has focus. The hook thread exits when
/// [`HotkeyHandle::stop`] is called.
///
/// On non-Windows platforms the public API compiles but is a no-op at runtime.
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use tokio::sync::mpsc;

use crate::event::AppEvent;

/// The two overlay commands a hotkey can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyCommand {
    /// Show/hide the in-game overlay.
    Toggle,
    /// Swap between the in-game overlay and the second-screen window.
    SecondScreen,
}

const CTRL_BIT: u32 = 1 << 16;
const SHIFT_BIT: u32 = 1 << 17;
const ALT_BIT: u32 = 1 << 18;

/// A key plus the modifiers that must be held with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    pub vk: u32,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Hotkey {
    /// Packs the binding into one word for the hook's atomics. 0 means unbound.
    pub fn pack(self) -> u32 {
        let mut packed = self.vk;
        if self.ctrl {
            packed |= CTRL_BIT;
        }
        if self.shift {
            packed |= SHIFT_BIT;
        }
        if self.alt {
            packed |= ALT_BIT;
        }
        packed
    }
}

/// Bindings read inside the hook callback.
static TOGGLE_KEY: AtomicU32 = AtomicU32::new(0);
static SECOND_SCREEN_KEY: AtomicU32 = AtomicU32::new(0);

/// Channel used to forward hotkey presses from the hook callback to the event
/// loop. Set once by [`start`].
static HOOK_TX: OnceLock<mpsc::Sender<AppEvent>> = OnceLock::new();

/// Converts a key name (e.g. `"F8"`, `"A"`) to a Windows virtual-key code.
///
/// Supports `F1`–`F12`, ASCII letters and digits, case-insensitively.
pub fn parse_vk(name: &str) -> Option<u32> {
    let upper = name.to_uppercase();
    if let Some(n) = upper.strip_prefix('F').and_then(|n| n.parse::<u32>().ok()) {
        return (1..=12).contains(&n).then(|| 0x6F + n);
    }
    let mut chars = upper.chars();
    match (chars.next(), chars.next()) {
        // 'A'..'Z' and '0'..'9' share their ASCII values with the VK codes.
        (Some(c), None) if c.is_ascii_alphanumeric() => Some(c as u32),
        _ => None,
    }
}

/// Parses a binding such as `"Ctrl+Shift+F9"`. Modifiers (`Ctrl`/`Control`,
/// `Shift`, `Alt`) may appear in any order; exactly one key must come last.
pub fn parse_hotkey(binding: &str) -> Option<Hotkey> {
    let parts: Vec<&str> = binding.split('+').map(str::trim).collect();
    let (key, modifiers) = parts.split_last()?;

    let mut hotkey = Hotkey {
        vk: parse_vk(key)?,
        ctrl: false,
        shift: false,
        alt: false,
    };
    for modifier in modifiers {
        match modifier.to_lowercase().as_str() {
            "ctrl" | "control" => hotkey.ctrl = true,
            "shift" => hotkey.shift = true,
            "alt" => hotkey.alt = true,
            _ => return None,
        }
    }
    Some(hotkey)
}

fn store_binding(slot: &AtomicU32, binding: &str) {
    let packed = match parse_hotkey(binding) {
        Some(hotkey) => hotkey.pack(),
        None => {
            tracing::warn!(target: "hotkey", "Unrecognised hotkey '{binding}', binding disabled");
            0
        }
    };
    slot.store(packed, Ordering::Relaxed);
}

/// Command bound to a packed key press, if any.
#[cfg_attr(not(windows), allow(dead_code))]
fn command_for(pressed: u32) -> Option<HotkeyCommand> {
    if pressed == 0 {
        return None;
    }
    if pressed == TOGGLE_KEY.load(Ordering::Relaxed) {
        Some(HotkeyCommand::Toggle)
    } else if pressed == SECOND_SCREEN_KEY.load(Ordering::Relaxed) {
        Some(HotkeyCommand::SecondScreen)
    } else {
        None
    }
}

// ── Public handle ─────────────────────────────────────────────────────────────

/// A handle to the running keyboard hook.
pub struct HotkeyHandle {
    #[cfg(windows)]
    thread: std::thread::JoinHandle<()>,
    /// Thread ID of the message-pump thread, used to post `WM_QUIT`.
    #[cfg(windows)]
    thread_id: u32,
}

impl HotkeyHandle {
    /// Re-binds both hotkeys (e.g. after a config reload). An unrecognised
    /// binding disables that hotkey without stopping the hook thread.
    pub fn update_bindings(&self, toggle: &str, second_screen: &str) {
        store_binding(&TOGGLE_KEY, toggle);
        store_binding(&SECOND_SCREEN_KEY, second_screen);
    }

    /// Signals the hook thread to stop and blocks until it exits.
    pub fn stop(self) {
        #[cfg(windows)]
        {
            imp::post_quit(self.thread_id);
            let _ = self.thread.join();
        }
    }
}

// ── Startup ───────────────────────────────────────────────────────────────────

/// Installs the keyboard hook on a dedicated OS thread.
///
/// Presses are sent to `tx` with a non-blocking `try_send`; a full channel
/// drops that press.
///
/// # Non-Windows
/// Returns a stub handle; bindings are stored but never fire.
pub fn start(
    toggle: &str,
    second_screen: &str,
    tx: mpsc::Sender<AppEvent>,
) -> anyhow::Result<HotkeyHandle> {
    store_binding(&TOGGLE_KEY, toggle);
    store_binding(&SECOND_SCREEN_KEY, second_screen);
    // Ignored if called more than once (e.g. in test binaries).
    let _ = HOOK_TX.set(tx);

    #[cfg(windows)]
    {
        use anyhow::Context;

        let (id_tx, id_rx) = std::sync::mpsc::sync_channel::<u32>(1);
        let thread = std::thread::Builder::new()
            .name("hotkey-pump".into())
            .spawn(move || imp::run_message_pump(id_tx))
            .context("Failed to spawn hotkey thread")?;
        let thread_id = id_rx.recv().context("Hotkey thread did not send its ID")?;
        Ok(HotkeyHandle { thread, thread_id })
    }

    #[cfg(not(windows))]
    Ok(HotkeyHandle {})
}

// ── Windows implementation ────────────────────────────────────────────────────

#[cfg(windows)]
mod imp {
    use std::sync::mpsc as std_mpsc;

    use windows::Win32::Foundation::{HINSTANCE, LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        GetAsyncKeyState, VK_CONTROL, VK_MENU, VK_SHIFT,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
        UnhookWindowsHookEx, KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL, WM_KEYDOWN, WM_QUIT,
        WM_SYSKEYDOWN,
    };

    use super::{command_for, Hotkey, HOOK_TX};
    use crate::event::AppEvent;

    fn held(vk: u16) -> bool {
        // High bit set = key currently down.
        unsafe { (GetAsyncKeyState(vk as i32) as u16 & 0x8000) != 0 }
    }

    /// Low-level keyboard hook procedure. Alt combinations arrive as `WM_SYSKEYDOWN`.
    unsafe extern "system" fn keyboard_proc(
        n_code: i32,
        w_param: WPARAM,
        l_param: LPARAM,
    ) -> LRESULT {
        let message = w_param.0 as u32;
        if n_code >= 0 && (message == WM_KEYDOWN || message == WM_SYSKEYDOWN) {
            let kb = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
            let pressed = Hotkey {
                vk: kb.vkCode,
                ctrl: held(VK_CONTROL.0),
                shift: held(VK_SHIFT.0),
                alt: held(VK_MENU.0),
            };
            if let (Some(command), Some(tx)) = (command_for(pressed.pack()), HOOK_TX.get()) {
                let _ = tx.try_send(AppEvent::Hotkey(command));
            }
        }
        CallNextHookEx(None, n_code, w_param, l_param)
    }

    /// Installs `WH_KEYBOARD_LL`, runs a message pump until `WM_QUIT`, then
    /// uninstalls the hook. Sends the thread ID to `id_tx` first so the
    /// handle can post `WM_QUIT` later.
    pub fn run_message_pump(id_tx: std_mpsc::SyncSender<u32>) {
        unsafe {
            let _ = id_tx.send(GetCurrentThreadId());
            drop(id_tx);

            let hook = match SetWindowsHookExW(
                WH_KEYBOARD_LL,
                Some(keyboard_proc),
                HINSTANCE::default(),
                0,
            ) {
                Ok(hook) => hook,
                Err(e) => {
                    tracing::error!(target: "hotkey", "SetWindowsHookExW failed: {e}");
                    return;
                }
            };

            let mut msg = MSG::default();
            // GetMessageW: >0 = message, 0 = WM_QUIT, <0 = error.
            while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
                DispatchMessageW(&msg);
            }

            let _ = UnhookWindowsHookEx(hook);
            tracing::debug!(target: "hotkey", "Hook thread exited");
        }
    }

    /// Posts `WM_QUIT` to `thread_id`, ending its `GetMessageW` loop.
    pub fn post_quit(thread_id: u32) {
        unsafe {
            let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

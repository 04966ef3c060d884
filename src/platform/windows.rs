//! Win32 implementation of the platform collaborators.
//!
//! A hidden top-level window receives shell-hook, raw-input, power and
//! setting broadcasts. The engine lives on the window's thread because a
//! raw-input handle is only valid while its `WM_INPUT` is being handled.

use crate::collector::decoder::{OsErrorCode, RawInputQuery};
use crate::collector::types::ModifierKeys;
use crate::engine::{Collaborators, EngineSettings, SystemClock, TelemetryEngine};
use crate::platform::{
    ModifierKeyQuery, NativeEvent, NativeEventSource, NativeMessage, RawInputHandle, SourceError,
    WindowHandle, WindowQuery,
};
use crate::sink::MetricsSink;
use crate::transparency::SharedTransparencyLog;
use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::mem::size_of;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use windows::core::{w, PCWSTR, PWSTR};
use windows::Win32::Foundation::{
    CloseHandle, GetLastError, BOOL, ERROR_ACCESS_DENIED, HINSTANCE, HWND, LPARAM, LRESULT,
    WPARAM,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::{
    GetExitCodeProcess, OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
    PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{GetKeyState, VK_CONTROL, VK_MENU, VK_SHIFT};
use windows::Win32::UI::Input::{
    GetRawInputData, RegisterRawInputDevices, HRAWINPUT, RAWINPUTDEVICE, RAWINPUTDEVICE_FLAGS,
    RAWINPUTHEADER, RIDEV_INPUTSINK, RIDEV_REMOVE, RID_INPUT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DeregisterShellHookWindow, DestroyWindow, DispatchMessageW,
    EnumChildWindows, GetClassNameW, GetForegroundWindow, GetMessageTime,
    GetWindowThreadProcessId, MsgWaitForMultipleObjects, PeekMessageW, RegisterClassW,
    RegisterShellHookWindow, RegisterWindowMessageW, TranslateMessage, UnregisterClassW, HMENU,
    MSG, PM_REMOVE, QS_ALLINPUT, WINDOW_EX_STYLE, WINDOW_STYLE, WNDCLASSW,
};

const WINDOW_CLASS: PCWSTR = w!("InputTelemetryMessageWindow");
const HID_USAGE_PAGE_GENERIC: u16 = 0x01;
const HID_USAGE_GENERIC_MOUSE: u16 = 0x02;
const HID_USAGE_GENERIC_KEYBOARD: u16 = 0x06;
const STILL_ACTIVE: u32 = 259;
/// Upper bound on one wait so the running flag is checked regularly.
const MAX_WAIT: Duration = Duration::from_millis(100);

thread_local! {
    static ENGINE: RefCell<Option<TelemetryEngine>> = const { RefCell::new(None) };
    static SHELL_HOOK_MESSAGE: Cell<u32> = const { Cell::new(0) };
}

fn to_hwnd(handle: WindowHandle) -> HWND {
    HWND(handle.0 as usize as *mut c_void)
}

fn from_hwnd(hwnd: HWND) -> WindowHandle {
    WindowHandle(hwnd.0 as usize as u64)
}

fn last_error() -> OsErrorCode {
    unsafe { GetLastError().0 }
}

/// Shell-hook and raw-input subscriptions for one message window.
pub struct Win32Source {
    hwnd: HWND,
}

impl Win32Source {
    fn register_raw_input(
        &self,
        flags: RAWINPUTDEVICE_FLAGS,
        target: HWND,
    ) -> windows::core::Result<()> {
        let devices = [HID_USAGE_GENERIC_MOUSE, HID_USAGE_GENERIC_KEYBOARD].map(|usage| {
            RAWINPUTDEVICE {
                usUsagePage: HID_USAGE_PAGE_GENERIC,
                usUsage: usage,
                dwFlags: flags,
                hwndTarget: target,
            }
        });
        unsafe { RegisterRawInputDevices(&devices, size_of::<RAWINPUTDEVICE>() as u32) }
    }
}

impl NativeEventSource for Win32Source {
    fn subscribe_window_messages(&mut self) -> Result<(), SourceError> {
        if unsafe { RegisterShellHookWindow(self.hwnd) }.as_bool() {
            Ok(())
        } else {
            Err(SourceError::ShellHookRegistration)
        }
    }

    fn unsubscribe_window_messages(&mut self) {
        let _ = unsafe { DeregisterShellHookWindow(self.hwnd) };
    }

    fn subscribe_raw_input(&mut self) -> Result<(), SourceError> {
        self.register_raw_input(RIDEV_INPUTSINK, self.hwnd)
            .map_err(|_| SourceError::RawInputRegistration(last_error()))
    }

    fn unsubscribe_raw_input(&mut self) {
        if let Err(e) = self.register_raw_input(RIDEV_REMOVE, HWND::default()) {
            tracing::warn!(error = %e, "failed to remove raw input registration");
        }
    }

    fn current_window_handle(&self) -> Option<WindowHandle> {
        let hwnd = unsafe { GetForegroundWindow() };
        (!hwnd.0.is_null()).then(|| from_hwnd(hwnd))
    }
}

/// Live window, process, raw-input and keyboard-state lookups.
#[derive(Debug, Clone, Copy, Default)]
pub struct Win32Queries;

impl WindowQuery for Win32Queries {
    fn class_name_of(&self, handle: WindowHandle) -> Option<String> {
        let mut buffer = [0u16; 256];
        let len = unsafe { GetClassNameW(to_hwnd(handle), &mut buffer) };
        (len > 0).then(|| String::from_utf16_lossy(&buffer[..len as usize]))
    }

    fn process_id_of(&self, handle: WindowHandle) -> Option<u32> {
        let mut pid = 0u32;
        unsafe { GetWindowThreadProcessId(to_hwnd(handle), Some(&mut pid as *mut u32)) };
        (pid != 0).then_some(pid)
    }

    fn executable_path_of(&self, pid: u32) -> Option<String> {
        let process = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }.ok()?;
        let mut buffer = [0u16; 1024];
        let mut len = buffer.len() as u32;
        let result = unsafe {
            QueryFullProcessImageNameW(
                process,
                PROCESS_NAME_WIN32,
                PWSTR(buffer.as_mut_ptr()),
                &mut len,
            )
        };
        let _ = unsafe { CloseHandle(process) };
        result
            .ok()
            .map(|()| String::from_utf16_lossy(&buffer[..len as usize]))
    }

    fn enumerate_child_windows(
        &self,
        handle: WindowHandle,
        visitor: &mut dyn FnMut(WindowHandle) -> bool,
    ) {
        let mut visitor = visitor;
        let context = &mut visitor as *mut &mut dyn FnMut(WindowHandle) -> bool;
        let _ = unsafe {
            EnumChildWindows(to_hwnd(handle), Some(enum_child_proc), LPARAM(context as isize))
        };
    }

    fn is_process_alive(&self, pid: u32) -> bool {
        let process = match unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) } {
            Ok(process) => process,
            // Exists but belongs to someone we may not inspect.
            Err(e) => return e.code() == ERROR_ACCESS_DENIED.to_hresult(),
        };
        let mut code = 0u32;
        let result = unsafe { GetExitCodeProcess(process, &mut code) };
        let _ = unsafe { CloseHandle(process) };
        result.is_ok() && code == STILL_ACTIVE
    }
}

impl RawInputQuery for Win32Queries {
    fn required_size(&self, handle: RawInputHandle) -> Result<usize, OsErrorCode> {
        let mut size = 0u32;
        let result = unsafe {
            GetRawInputData(
                HRAWINPUT(handle.0 as usize as *mut c_void),
                RID_INPUT,
                None,
                &mut size,
                size_of::<RAWINPUTHEADER>() as u32,
            )
        };
        if result == u32::MAX {
            Err(last_error())
        } else {
            Ok(size as usize)
        }
    }

    fn fill(&self, handle: RawInputHandle, buffer: &mut [u8]) -> Result<usize, OsErrorCode> {
        let mut size = buffer.len() as u32;
        let result = unsafe {
            GetRawInputData(
                HRAWINPUT(handle.0 as usize as *mut c_void),
                RID_INPUT,
                Some(buffer.as_mut_ptr().cast()),
                &mut size,
                size_of::<RAWINPUTHEADER>() as u32,
            )
        };
        if result == u32::MAX {
            Err(last_error())
        } else {
            Ok(result as usize)
        }
    }
}

impl ModifierKeyQuery for Win32Queries {
    fn held_modifiers(&self) -> ModifierKeys {
        let down = |key: i32| unsafe { GetKeyState(key) } < 0;
        ModifierKeys {
            shift: down(i32::from(VK_SHIFT.0)),
            ctrl: down(i32::from(VK_CONTROL.0)),
            alt: down(i32::from(VK_MENU.0)),
        }
    }
}

unsafe extern "system" fn enum_child_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let visitor = &mut *(lparam.0 as *mut &mut dyn FnMut(WindowHandle) -> bool);
    BOOL::from(visitor(from_hwnd(hwnd)))
}

/// Run `f` against the engine on this thread, if it is not already borrowed.
fn with_engine(f: impl FnOnce(&mut TelemetryEngine)) {
    ENGINE.with(|cell| match cell.try_borrow_mut() {
        Ok(mut engine) => {
            if let Some(engine) = engine.as_mut() {
                f(engine);
            }
        }
        Err(_) => tracing::debug!("engine busy; dropping re-entrant notification"),
    });
}

/// Read the NUL-terminated area string that accompanies `WM_SETTINGCHANGE`.
unsafe fn setting_area(lparam: LPARAM) -> Option<String> {
    if lparam.0 == 0 {
        return None;
    }
    PCWSTR(lparam.0 as *const u16).to_string().ok()
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let native = NativeMessage {
        message,
        wparam: wparam.0 as u64,
        lparam: lparam.0 as i64,
        time: GetMessageTime() as u32,
    };
    let shell_hook_message = SHELL_HOOK_MESSAGE.with(Cell::get);

    if let Some(mut event) = native.translate(shell_hook_message) {
        if let NativeEvent::SettingChange { area, .. } = &mut event {
            *area = setting_area(lparam);
        }
        with_engine(|engine| engine.dispatch(event));
    }

    DefWindowProcW(hwnd, message, wparam, lparam)
}

fn create_message_window() -> Result<(HWND, HINSTANCE), SourceError> {
    unsafe {
        let module =
            GetModuleHandleW(None).map_err(|e| SourceError::WindowCreation(e.to_string()))?;
        let instance = HINSTANCE::from(module);

        let class = WNDCLASSW {
            lpfnWndProc: Some(window_proc),
            hInstance: instance,
            lpszClassName: WINDOW_CLASS,
            ..Default::default()
        };
        if RegisterClassW(&class) == 0 {
            return Err(SourceError::WindowCreation(format!(
                "RegisterClassW failed (os error {})",
                last_error()
            )));
        }

        // A hidden top-level window: message-only windows miss broadcasts.
        let hwnd = CreateWindowExW(
            WINDOW_EX_STYLE::default(),
            WINDOW_CLASS,
            w!("input-telemetry"),
            WINDOW_STYLE::default(),
            0,
            0,
            0,
            0,
            HWND::default(),
            HMENU::default(),
            instance,
            None,
        )
        .map_err(|e| SourceError::WindowCreation(e.to_string()))?;

        Ok((hwnd, instance))
    }
}

/// Create the message window, start an engine on it and pump messages until
/// `running` is cleared.
pub fn run_message_loop(
    settings: EngineSettings,
    sink: Box<dyn MetricsSink>,
    transparency: SharedTransparencyLog,
    running: Arc<AtomicBool>,
) -> Result<(), SourceError> {
    let (hwnd, instance) = create_message_window()?;
    let shell_hook_message = unsafe { RegisterWindowMessageW(w!("SHELLHOOK")) };
    SHELL_HOOK_MESSAGE.with(|id| id.set(shell_hook_message));

    let engine = TelemetryEngine::new(
        settings,
        Collaborators {
            source: Box::new(Win32Source { hwnd }),
            windows: Box::new(Win32Queries),
            raw_input: Box::new(Win32Queries),
            modifiers: Box::new(Win32Queries),
            sink,
            clock: Box::new(SystemClock::new()),
        },
    )
    .with_transparency_log(transparency);
    ENGINE.with(|cell| *cell.borrow_mut() = Some(engine));

    let mut started = Ok(());
    with_engine(|engine| started = engine.start());

    if started.is_ok() {
        pump_messages(&running);
    }

    with_engine(TelemetryEngine::stop);
    ENGINE.with(|cell| cell.borrow_mut().take());
    unsafe {
        let _ = DestroyWindow(hwnd);
        let _ = UnregisterClassW(WINDOW_CLASS, instance);
    }
    started
}

fn pump_messages(running: &AtomicBool) {
    let mut msg = MSG::default();
    while running.load(Ordering::SeqCst) {
        let mut wait = MAX_WAIT;
        with_engine(|engine| {
            if let Some(until) = engine.time_until_next_task() {
                wait = wait.min(until);
            }
        });

        unsafe {
            MsgWaitForMultipleObjects(None, false, wait.as_millis() as u32, QS_ALLINPUT);
            while PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_REMOVE).as_bool() {
                let _ = TranslateMessage(&msg);
                let _ = DispatchMessageW(&msg);
            }
        }

        with_engine(|engine| {
            engine.run_due();
        });
    }
}

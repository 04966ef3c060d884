//! Window and application lifecycle tracking.
//!
//! The tracker keeps a cache of known windows and one entry per running
//! application. Shell notifications are correlated against both to produce
//! launch, focus and close records. Once a window is destroyed only the
//! cached copy is consulted; the OS handle is gone.

use crate::core::metrics::{AppFocus, AppLifecycle, Metric};
use crate::core::paths::PathGenericizer;
use crate::engine::scheduler::Scheduler;
use crate::engine::Task;
use crate::platform::{WindowHandle, WindowQuery};
use std::collections::HashMap;
use std::time::Duration;

/// Class of the frame that hosts packaged (UWP) applications.
pub const APP_FRAME_CLASS: &str = "ApplicationFrameWindow";
/// Executable that owns [`APP_FRAME_CLASS`] frames.
pub const APP_FRAME_HOST_EXE: &str = "ApplicationFrameHost.exe";
/// Class of the child window owned by the hosted application.
pub const CORE_WINDOW_CLASS: &str = "Windows.UI.Core.CoreWindow";
/// Class reported when the OS does not return one.
pub const UNKNOWN_CLASS: &str = "unknown";

pub const CLOSE_POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const CLOSE_TIMEOUT: Duration = Duration::from_millis(20_000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub process_id: u32,
    pub executable_path: String,
    pub class_name: String,
}

impl WindowInfo {
    /// `<pid>:<handle hex>`, stable for the lifetime of the window.
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.process_id, self.handle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningApplication {
    pub process_id: u32,
    pub executable_path: String,
    /// A termination poll is in flight
    pub closing: bool,
}

/// The focused window and the snapshot taken when it was activated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveWindowState {
    pub handle: Option<WindowHandle>,
    pub window: Option<WindowInfo>,
}

/// An application whose window was destroyed and may be exiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingClose {
    pub process_id: u32,
    pub executable_path: String,
    pub window_class: String,
    pub started_at: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct TrackerSettings {
    /// Our own pid, used for the foreground flag
    pub own_process_id: u32,
    pub close_poll_interval: Duration,
    pub close_timeout: Duration,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            own_process_id: std::process::id(),
            close_poll_interval: CLOSE_POLL_INTERVAL,
            close_timeout: CLOSE_TIMEOUT,
        }
    }
}

#[derive(Debug)]
pub struct WindowActivityTracker {
    windows: HashMap<WindowHandle, WindowInfo>,
    applications: HashMap<u32, RunningApplication>,
    active: ActiveWindowState,
    own_window_focused: bool,
    genericizer: PathGenericizer,
    settings: TrackerSettings,
}

impl WindowActivityTracker {
    pub fn new(genericizer: PathGenericizer, settings: TrackerSettings) -> Self {
        Self {
            windows: HashMap::new(),
            applications: HashMap::new(),
            active: ActiveWindowState::default(),
            own_window_focused: false,
            genericizer,
            settings,
        }
    }

    pub fn window(&self, handle: WindowHandle) -> Option<&WindowInfo> {
        self.windows.get(&handle)
    }

    pub fn application(&self, pid: u32) -> Option<&RunningApplication> {
        self.applications.get(&pid)
    }

    pub fn active(&self) -> &ActiveWindowState {
        &self.active
    }

    /// Whether a window of this process currently has focus.
    pub fn is_own_window_focused(&self) -> bool {
        self.own_window_focused
    }

    /// A top-level window appeared.
    pub fn window_created(&mut self, handle: WindowHandle, query: &dyn WindowQuery) -> Vec<Metric> {
        let info = match self.windows.get(&handle) {
            Some(info) => info.clone(),
            None => {
                let info = resolve_window(handle, query);
                self.windows.insert(handle, info.clone());
                info
            }
        };
        self.detect_launch(&info).into_iter().collect()
    }

    /// A top-level window went away. Nothing is emitted until the owning
    /// process is seen to exit.
    pub fn window_destroyed(
        &mut self,
        handle: WindowHandle,
        timers: &mut Scheduler<Task>,
        now: u64,
    ) {
        let Some(info) = self.windows.remove(&handle) else {
            return;
        };
        let Some(app) = self.applications.get_mut(&info.process_id) else {
            return;
        };
        if app.closing || app.executable_path != info.executable_path {
            return;
        }

        app.closing = true;
        tracing::debug!(pid = info.process_id, "window destroyed; polling for process exit");
        let pending = PendingClose {
            process_id: info.process_id,
            executable_path: info.executable_path,
            window_class: info.class_name,
            started_at: now,
        };
        timers.schedule(now, self.settings.close_poll_interval, Task::ConfirmClose(pending));
    }

    /// One termination poll tick.
    pub fn confirm_close(
        &mut self,
        pending: PendingClose,
        query: &dyn WindowQuery,
        timers: &mut Scheduler<Task>,
        now: u64,
    ) -> Option<Metric> {
        let pid = pending.process_id;
        match self.applications.get(&pid) {
            Some(app) if app.closing && app.executable_path == pending.executable_path => {}
            // Relaunched or already closed under this pid.
            _ => return None,
        }

        if !query.is_process_alive(pid) {
            self.applications.remove(&pid);
            return Some(Metric::AppClose(AppLifecycle {
                exe: self.genericizer.genericize(&pending.executable_path),
                pid,
                window_class: pending.window_class,
            }));
        }

        let elapsed = Duration::from_millis(now.saturating_sub(pending.started_at));
        if elapsed >= self.settings.close_timeout {
            tracing::debug!(pid, "process still alive; giving up on close");
            if let Some(app) = self.applications.get_mut(&pid) {
                app.closing = false;
            }
            return None;
        }

        timers.schedule(now, self.settings.close_poll_interval, Task::ConfirmClose(pending));
        None
    }

    /// Forget close polls that will never run. Applications that were being
    /// polled count as running again.
    pub fn abandon_close_polls(&mut self) {
        for app in self.applications.values_mut() {
            app.closing = false;
        }
    }

    /// Focus moved to `handle`, already resolved against the OS foreground
    /// window when the notification carried none.
    pub fn window_activated(
        &mut self,
        handle: Option<WindowHandle>,
        query: &dyn WindowQuery,
    ) -> Vec<Metric> {
        if handle == self.active.handle {
            return Vec::new();
        }

        let mut records = Vec::new();
        if let Some(previous) = self.active.window.take() {
            records.push(Metric::AppInactive(self.focus_record(&previous)));
        }
        self.own_window_focused = false;
        self.active.handle = handle;

        let Some(handle) = handle else {
            return records;
        };
        if !self.windows.contains_key(&handle) {
            records.extend(self.window_created(handle, query));
        }
        if let Some(info) = self.windows.get(&handle).cloned() {
            if info.process_id == self.settings.own_process_id {
                self.own_window_focused = true;
            }
            records.push(Metric::AppActive(self.focus_record(&info)));
            self.active.window = Some(info);
        }
        records
    }

    fn detect_launch(&mut self, info: &WindowInfo) -> Option<Metric> {
        if let Some(app) = self.applications.get(&info.process_id) {
            if app.executable_path == info.executable_path {
                return None;
            }
        }

        self.applications.insert(
            info.process_id,
            RunningApplication {
                process_id: info.process_id,
                executable_path: info.executable_path.clone(),
                closing: false,
            },
        );
        Some(Metric::AppLaunch(AppLifecycle {
            exe: self.genericizer.genericize(&info.executable_path),
            pid: info.process_id,
            window_class: info.class_name.clone(),
        }))
    }

    fn focus_record(&self, info: &WindowInfo) -> AppFocus {
        AppFocus {
            exe: self.genericizer.genericize(&info.executable_path),
            window: info.identifier(),
            window_class: info.class_name.clone(),
        }
    }
}

/// Build a [`WindowInfo`] from live OS queries.
fn resolve_window(handle: WindowHandle, query: &dyn WindowQuery) -> WindowInfo {
    let class_name = query
        .class_name_of(handle)
        .unwrap_or_else(|| UNKNOWN_CLASS.to_string());
    let (process_id, executable_path) = resolve_process(handle, query);

    let mut info = WindowInfo {
        handle,
        process_id,
        executable_path,
        class_name,
    };

    if info.class_name == APP_FRAME_CLASS && file_name_is(&info.executable_path, APP_FRAME_HOST_EXE)
    {
        if let Some(core) = find_core_window(handle, query) {
            let (pid, exe) = resolve_process(core, query);
            if pid != 0 {
                info.process_id = pid;
                info.executable_path = exe;
            }
        }
    }
    info
}

fn resolve_process(handle: WindowHandle, query: &dyn WindowQuery) -> (u32, String) {
    match query.process_id_of(handle).filter(|&pid| pid != 0) {
        Some(pid) => {
            let exe = query
                .executable_path_of(pid)
                .unwrap_or_else(|| format!("pid-{pid}"));
            (pid, exe)
        }
        None => (0, format!("unknown-{handle}")),
    }
}

fn find_core_window(frame: WindowHandle, query: &dyn WindowQuery) -> Option<WindowHandle> {
    let mut found = None;
    query.enumerate_child_windows(frame, &mut |child| {
        if query.class_name_of(child).as_deref() == Some(CORE_WINDOW_CLASS) {
            found = Some(child);
            false
        } else {
            true
        }
    });
    found
}

fn file_name_is(path: &str, expected: &str) -> bool {
    path.rsplit(|c| c == '\\' || c == '/')
        .next()
        .is_some_and(|name| name.eq_ignore_ascii_case(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::cell::RefCell;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeWindows {
        classes: HashMap<WindowHandle, String>,
        pids: HashMap<WindowHandle, u32>,
        exes: HashMap<u32, String>,
        children: HashMap<WindowHandle, Vec<WindowHandle>>,
        alive: RefCell<HashSet<u32>>,
    }

    impl FakeWindows {
        fn add(&mut self, handle: u64, pid: u32, exe: &str, class: &str) {
            self.classes.insert(WindowHandle(handle), class.into());
            self.pids.insert(WindowHandle(handle), pid);
            self.exes.insert(pid, exe.into());
            self.alive.borrow_mut().insert(pid);
        }

        fn kill(&self, pid: u32) {
            self.alive.borrow_mut().remove(&pid);
        }
    }

    impl WindowQuery for FakeWindows {
        fn class_name_of(&self, handle: WindowHandle) -> Option<String> {
            self.classes.get(&handle).cloned()
        }

        fn process_id_of(&self, handle: WindowHandle) -> Option<u32> {
            self.pids.get(&handle).copied()
        }

        fn executable_path_of(&self, pid: u32) -> Option<String> {
            self.exes.get(&pid).cloned()
        }

        fn enumerate_child_windows(
            &self,
            handle: WindowHandle,
            visitor: &mut dyn FnMut(WindowHandle) -> bool,
        ) {
            for &child in self.children.get(&handle).into_iter().flatten() {
                if !visitor(child) {
                    break;
                }
            }
        }

        fn is_process_alive(&self, pid: u32) -> bool {
            self.alive.borrow().contains(&pid)
        }
    }

    const EDITOR: &str = r"C:\Program Files\Editor\editor.exe";

    fn tracker() -> WindowActivityTracker {
        let env: HashMap<String, String> =
            [("ProgramFiles".to_string(), r"C:\Program Files".to_string())].into();
        WindowActivityTracker::new(
            PathGenericizer::from_env(&env),
            TrackerSettings {
                own_process_id: 9999,
                ..TrackerSettings::default()
            },
        )
    }

    /// Run due close polls until none remain, collecting records.
    fn drain(
        tracker: &mut WindowActivityTracker,
        timers: &mut Scheduler<Task>,
        query: &dyn WindowQuery,
        until: u64,
    ) -> Vec<Metric> {
        let mut records = Vec::new();
        let mut now = 0;
        while now <= until {
            while let Some((_, task)) = timers.pop_due(now) {
                let Task::ConfirmClose(pending) = task else {
                    panic!("unexpected task {task:?}");
                };
                records.extend(tracker.confirm_close(pending, query, timers, now));
            }
            now += 100;
        }
        records
    }

    #[test]
    fn test_created_window_launches_application_once() {
        let mut windows = FakeWindows::default();
        windows.add(0x10, 42, EDITOR, "EditorWindow");
        windows.add(0x11, 42, EDITOR, "EditorPalette");
        let mut tracker = tracker();

        let records = tracker.window_created(WindowHandle(0x10), &windows);
        assert_eq!(
            records,
            vec![Metric::AppLaunch(AppLifecycle {
                exe: r"%ProgramFiles%\Editor\editor.exe".into(),
                pid: 42,
                window_class: "EditorWindow".into(),
            })]
        );
        assert!(tracker.window_created(WindowHandle(0x11), &windows).is_empty());
    }

    #[test]
    fn test_pid_reuse_with_different_exe_is_new_launch() {
        let mut windows = FakeWindows::default();
        windows.add(0x10, 42, EDITOR, "EditorWindow");
        let mut tracker = tracker();
        tracker.window_created(WindowHandle(0x10), &windows);

        windows.add(0x20, 42, r"D:\games\game.exe", "GameWindow");
        let records = tracker.window_created(WindowHandle(0x20), &windows);
        assert_matches!(records.as_slice(), [Metric::AppLaunch(AppLifecycle { pid: 42, .. })]);
        assert_eq!(
            tracker.application(42).map(|a| a.executable_path.as_str()),
            Some(r"D:\games\game.exe")
        );
    }

    #[test]
    fn test_unresolvable_window_uses_placeholders() {
        let windows = FakeWindows::default();
        let mut tracker = tracker();
        tracker.window_created(WindowHandle(0xab), &windows);

        let info = tracker.window(WindowHandle(0xab)).cloned();
        assert_eq!(
            info,
            Some(WindowInfo {
                handle: WindowHandle(0xab),
                process_id: 0,
                executable_path: "unknown-ab".into(),
                class_name: UNKNOWN_CLASS.into(),
            })
        );
    }

    #[test]
    fn test_app_frame_adopts_core_window_process() {
        let mut windows = FakeWindows::default();
        windows.add(
            0x30,
            7,
            r"C:\Windows\System32\ApplicationFrameHost.exe",
            APP_FRAME_CLASS,
        );
        windows.add(0x31, 8, r"C:\Apps\helper.exe", "Helper");
        windows.add(0x32, 77, r"C:\Apps\Calculator.exe", CORE_WINDOW_CLASS);
        windows
            .children
            .insert(WindowHandle(0x30), vec![WindowHandle(0x31), WindowHandle(0x32)]);
        let mut tracker = tracker();

        tracker.window_created(WindowHandle(0x30), &windows);
        let info = tracker.window(WindowHandle(0x30)).cloned();
        assert_eq!(
            info,
            Some(WindowInfo {
                handle: WindowHandle(0x30),
                process_id: 77,
                executable_path: r"C:\Apps\Calculator.exe".into(),
                class_name: APP_FRAME_CLASS.into(),
            })
        );
    }

    #[test]
    fn test_destroy_then_exit_reports_close() {
        let mut windows = FakeWindows::default();
        windows.add(0x10, 42, EDITOR, "EditorWindow");
        let mut tracker = tracker();
        let mut timers = Scheduler::new();
        tracker.window_created(WindowHandle(0x10), &windows);

        tracker.window_destroyed(WindowHandle(0x10), &mut timers, 0);
        assert!(tracker.window(WindowHandle(0x10)).is_none());
        assert!(tracker.application(42).is_some_and(|a| a.closing));

        windows.kill(42);
        let records = drain(&mut tracker, &mut timers, &windows, 5_000);
        assert_eq!(
            records,
            vec![Metric::AppClose(AppLifecycle {
                exe: r"%ProgramFiles%\Editor\editor.exe".into(),
                pid: 42,
                window_class: "EditorWindow".into(),
            })]
        );
        assert!(tracker.application(42).is_none());
    }

    #[test]
    fn test_close_poll_times_out_silently() {
        let mut windows = FakeWindows::default();
        windows.add(0x10, 42, EDITOR, "EditorWindow");
        let mut tracker = tracker();
        let mut timers = Scheduler::new();
        tracker.window_created(WindowHandle(0x10), &windows);
        tracker.window_destroyed(WindowHandle(0x10), &mut timers, 0);

        assert!(drain(&mut tracker, &mut timers, &windows, 30_000).is_empty());
        assert!(timers.is_empty());
        assert!(tracker.application(42).is_some_and(|a| !a.closing));
    }

    #[test]
    fn test_second_destroy_does_not_start_another_poll() {
        let mut windows = FakeWindows::default();
        windows.add(0x10, 42, EDITOR, "EditorWindow");
        windows.add(0x11, 42, EDITOR, "EditorPalette");
        let mut tracker = tracker();
        let mut timers = Scheduler::new();
        tracker.window_created(WindowHandle(0x10), &windows);
        tracker.window_created(WindowHandle(0x11), &windows);

        tracker.window_destroyed(WindowHandle(0x10), &mut timers, 0);
        tracker.window_destroyed(WindowHandle(0x11), &mut timers, 0);
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn test_abandoned_poll_allows_new_destroy() {
        let mut windows = FakeWindows::default();
        windows.add(0x10, 42, EDITOR, "EditorWindow");
        windows.add(0x11, 42, EDITOR, "EditorPalette");
        let mut tracker = tracker();
        let mut timers = Scheduler::new();
        tracker.window_created(WindowHandle(0x10), &windows);
        tracker.window_created(WindowHandle(0x11), &windows);
        tracker.window_destroyed(WindowHandle(0x10), &mut timers, 0);

        timers.clear();
        tracker.abandon_close_polls();
        assert!(tracker.application(42).is_some_and(|a| !a.closing));

        tracker.window_destroyed(WindowHandle(0x11), &mut timers, 0);
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn test_activation_pairs_inactive_with_active() {
        let mut windows = FakeWindows::default();
        windows.add(0xa, 1, r"C:\a.exe", "A");
        windows.add(0xb, 2, r"C:\b.exe", "B");
        let mut tracker = tracker();
        tracker.window_created(WindowHandle(0xa), &windows);
        tracker.window_created(WindowHandle(0xb), &windows);

        tracker.window_activated(Some(WindowHandle(0xa)), &windows);
        let records = tracker.window_activated(Some(WindowHandle(0xb)), &windows);
        assert_eq!(
            records,
            vec![
                Metric::AppInactive(AppFocus {
                    exe: r"C:\a.exe".into(),
                    window: "1:a".into(),
                    window_class: "A".into(),
                }),
                Metric::AppActive(AppFocus {
                    exe: r"C:\b.exe".into(),
                    window: "2:b".into(),
                    window_class: "B".into(),
                }),
            ]
        );
        assert!(tracker
            .window_activated(Some(WindowHandle(0xb)), &windows)
            .is_empty());
    }

    #[test]
    fn test_activating_unknown_window_creates_it() {
        let mut windows = FakeWindows::default();
        windows.add(0xc, 3, r"C:\c.exe", "C");
        let mut tracker = tracker();

        let records = tracker.window_activated(Some(WindowHandle(0xc)), &windows);
        assert_matches!(
            records.as_slice(),
            [Metric::AppLaunch(_), Metric::AppActive(_)]
        );
        assert_eq!(tracker.active().handle, Some(WindowHandle(0xc)));
    }

    #[test]
    fn test_own_window_sets_focus_flag() {
        let mut windows = FakeWindows::default();
        windows.add(0x1, 9999, r"C:\self.exe", "Self");
        windows.add(0x2, 5, r"C:\other.exe", "Other");
        let mut tracker = tracker();

        tracker.window_activated(Some(WindowHandle(0x1)), &windows);
        assert!(tracker.is_own_window_focused());
        tracker.window_activated(Some(WindowHandle(0x2)), &windows);
        assert!(!tracker.is_own_window_focused());
    }

    #[test]
    fn test_focus_lost_to_nothing() {
        let mut windows = FakeWindows::default();
        windows.add(0xa, 1, r"C:\a.exe", "A");
        let mut tracker = tracker();
        tracker.window_activated(Some(WindowHandle(0xa)), &windows);

        let records = tracker.window_activated(None, &windows);
        assert_matches!(records.as_slice(), [Metric::AppInactive(_)]);
        assert_eq!(tracker.active(), &ActiveWindowState::default());
    }
}

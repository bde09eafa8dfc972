//! Detection of exam-integrity violations.
//!
//! Every handler returns a [`Verdict`]; the controller decides what a counted violation
//! triggers. Once [`IntegrityMonitor::disarm`] is called (a submission owns the session)
//! handlers stop counting until a failed manual submission re-arms the monitor.

use std::time::Duration;

use tokio::time::Instant;

use super::events::{ClipboardAction, EventTarget, KeyChord, WindowEvent, WindowMetrics};
use crate::core::config::SessionSettings;

pub(crate) const BLUR_REASON: &str = "Tab switch or window blur detected";
pub(crate) const CONTEXT_MENU_REASON: &str = "Right click detected";
pub(crate) const DEVTOOLS_WINDOW_REASON: &str = "DevTools window detected";

/// Returns the violation reason when `chord` opens developer tools or page source.
pub(crate) fn devtools_shortcut(chord: &KeyChord) -> Option<&'static str> {
    if chord.is_key("F12") {
        return Some("F12 key pressed");
    }

    let letter = chord.key.to_ascii_uppercase();
    match (chord.ctrl, chord.shift, chord.alt, chord.meta, letter.as_str()) {
        (true, true, _, _, "I") => Some("Ctrl+Shift+I pressed"),
        (true, true, _, _, "J") => Some("Ctrl+Shift+J pressed"),
        (true, true, _, _, "C") => Some("Ctrl+Shift+C pressed"),
        (_, _, true, true, "I") => Some("Cmd+Option+I pressed"),
        (_, _, true, true, "J") => Some("Cmd+Option+J pressed"),
        (_, _, true, true, "C") => Some("Cmd+Option+C pressed"),
        (_, _, true, true, "U") => Some("Cmd+Option+U pressed"),
        (true, false, false, _, "U") => Some("Ctrl+U pressed"),
        _ => None,
    }
}

/// Prevent-default policy registered with the window hub.
pub(crate) fn prevents_default(event: &WindowEvent) -> bool {
    match event {
        WindowEvent::KeyDown(chord) => devtools_shortcut(chord).is_some(),
        WindowEvent::ContextMenu => true,
        WindowEvent::Clipboard { target, .. } => !target.allows_clipboard(),
        _ => false,
    }
}

fn clipboard_reason(action: ClipboardAction) -> &'static str {
    match action {
        ClipboardAction::Copy => "Copy operation detected",
        ClipboardAction::Paste => "Paste operation detected",
        ClipboardAction::Cut => "Cut operation detected",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ViolationSignal {
    WindowBlur,
    DevtoolsShortcut,
    ContextMenu,
    Clipboard,
    DevtoolsWindow,
}

impl ViolationSignal {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ViolationSignal::WindowBlur => "window_blur",
            ViolationSignal::DevtoolsShortcut => "devtools_shortcut",
            ViolationSignal::ContextMenu => "context_menu",
            ViolationSignal::Clipboard => "clipboard",
            ViolationSignal::DevtoolsWindow => "devtools_window",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Violation {
    pub(crate) signal: ViolationSignal,
    pub(crate) reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    Ignored,
    Counted {
        violation: Violation,
        count: u32,
        /// True only for the violation that first reaches the threshold.
        threshold_reached: bool,
    },
}

#[derive(Debug)]
pub(crate) struct IntegrityMonitor {
    threshold: u32,
    blur_debounce: Duration,
    file_picker_grace: Duration,
    devtools_threshold_px: u32,
    count: u32,
    crossed: bool,
    armed: bool,
    last_blur: Option<Instant>,
    file_picker_opened_at: Option<Instant>,
    report_open: bool,
    metrics: Option<WindowMetrics>,
    devtools_open: bool,
}

impl IntegrityMonitor {
    pub(crate) fn new(settings: &SessionSettings) -> Self {
        Self {
            threshold: settings.violation_threshold.max(1),
            blur_debounce: settings.blur_debounce(),
            file_picker_grace: settings.file_picker_grace(),
            devtools_threshold_px: settings.devtools_threshold_px,
            count: 0,
            crossed: false,
            armed: true,
            last_blur: None,
            file_picker_opened_at: None,
            report_open: false,
            metrics: None,
            devtools_open: false,
        }
    }

    pub(crate) fn count(&self) -> u32 {
        self.count
    }

    pub(crate) fn threshold(&self) -> u32 {
        self.threshold
    }

    pub(crate) fn report_open(&self) -> bool {
        self.report_open
    }

    pub(crate) fn set_report_open(&mut self, open: bool) {
        self.report_open = open;
    }

    pub(crate) fn file_picker_opened(&mut self, now: Instant) {
        self.file_picker_opened_at = Some(now);
    }

    pub(crate) fn observe_metrics(&mut self, metrics: WindowMetrics) {
        self.metrics = Some(metrics);
    }

    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }

    pub(crate) fn arm(&mut self) {
        self.armed = true;
    }

    pub(crate) fn on_blur(&mut self, now: Instant) -> Verdict {
        if !self.armed || self.report_open {
            return Verdict::Ignored;
        }
        if let Some(opened_at) = self.file_picker_opened_at {
            if now.saturating_duration_since(opened_at) < self.file_picker_grace {
                return Verdict::Ignored;
            }
        }
        if let Some(last) = self.last_blur {
            if now.saturating_duration_since(last) < self.blur_debounce {
                return Verdict::Ignored;
            }
        }

        self.last_blur = Some(now);
        self.record(ViolationSignal::WindowBlur, BLUR_REASON)
    }

    pub(crate) fn on_key(&mut self, chord: &KeyChord) -> Verdict {
        match devtools_shortcut(chord) {
            Some(reason) => self.record(ViolationSignal::DevtoolsShortcut, reason),
            None => Verdict::Ignored,
        }
    }

    pub(crate) fn on_context_menu(&mut self) -> Verdict {
        self.record(ViolationSignal::ContextMenu, CONTEXT_MENU_REASON)
    }

    pub(crate) fn on_clipboard(&mut self, action: ClipboardAction, target: EventTarget) -> Verdict {
        if target.allows_clipboard() {
            return Verdict::Ignored;
        }
        self.record(ViolationSignal::Clipboard, clipboard_reason(action))
    }

    /// Recurring check for a docked developer-tools panel; counts once per opening.
    pub(crate) fn probe_devtools(&mut self) -> Verdict {
        let Some(metrics) = self.metrics else {
            return Verdict::Ignored;
        };

        let width_gap = metrics.outer_width.saturating_sub(metrics.inner_width);
        let height_gap = metrics.outer_height.saturating_sub(metrics.inner_height);
        let open = width_gap > self.devtools_threshold_px || height_gap > self.devtools_threshold_px;

        let newly_opened = open && !self.devtools_open;
        self.devtools_open = open;
        if !newly_opened {
            return Verdict::Ignored;
        }
        self.record(ViolationSignal::DevtoolsWindow, DEVTOOLS_WINDOW_REASON)
    }

    fn record(&mut self, signal: ViolationSignal, reason: &str) -> Verdict {
        if !self.armed {
            return Verdict::Ignored;
        }

        self.count += 1;
        let threshold_reached = !self.crossed && self.count >= self.threshold;
        if threshold_reached {
            self.crossed = true;
        }

        Verdict::Counted {
            violation: Violation { signal, reason: reason.to_string() },
            count: self.count,
            threshold_reached,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> IntegrityMonitor {
        IntegrityMonitor::new(&SessionSettings::default())
    }

    fn counted(verdict: &Verdict) -> bool {
        matches!(verdict, Verdict::Counted { .. })
    }

    #[test]
    fn devtools_shortcuts_are_recognized() {
        assert_eq!(devtools_shortcut(&KeyChord::key("F12")), Some("F12 key pressed"));
        assert!(devtools_shortcut(&KeyChord::parse("ctrl+shift+i").unwrap()).is_some());
        assert!(devtools_shortcut(&KeyChord::parse("ctrl+shift+j").unwrap()).is_some());
        assert!(devtools_shortcut(&KeyChord::parse("cmd+alt+c").unwrap()).is_some());
        assert_eq!(devtools_shortcut(&KeyChord::parse("ctrl+u").unwrap()), Some("Ctrl+U pressed"));

        assert!(devtools_shortcut(&KeyChord::parse("ctrl+c").unwrap()).is_none());
        assert!(devtools_shortcut(&KeyChord::parse("ctrl+shift+u").unwrap()).is_none());
        assert!(devtools_shortcut(&KeyChord::key("a")).is_none());
    }

    #[test]
    fn first_violation_reaches_default_threshold() {
        let mut monitor = monitor();
        let verdict = monitor.on_key(&KeyChord::key("F12"));
        assert_eq!(
            verdict,
            Verdict::Counted {
                violation: Violation {
                    signal: ViolationSignal::DevtoolsShortcut,
                    reason: "F12 key pressed".to_string(),
                },
                count: 1,
                threshold_reached: true,
            }
        );
        assert_eq!(monitor.count(), 1);
    }

    #[test]
    fn threshold_is_reported_only_once() {
        let settings = SessionSettings { violation_threshold: 2, ..SessionSettings::default() };
        let mut monitor = IntegrityMonitor::new(&settings);

        let first = monitor.on_context_menu();
        assert!(matches!(first, Verdict::Counted { count: 1, threshold_reached: false, .. }));
        let second = monitor.on_context_menu();
        assert!(matches!(second, Verdict::Counted { count: 2, threshold_reached: true, .. }));
        let third = monitor.on_context_menu();
        assert!(matches!(third, Verdict::Counted { count: 3, threshold_reached: false, .. }));
    }

    #[test]
    fn blur_within_file_picker_grace_is_ignored() {
        let mut monitor = monitor();
        let start = Instant::now();
        monitor.file_picker_opened(start);

        assert_eq!(monitor.on_blur(start + Duration::from_millis(1500)), Verdict::Ignored);
        assert_eq!(monitor.count(), 0);
        assert!(counted(&monitor.on_blur(start + Duration::from_millis(2500))));
    }

    #[test]
    fn repeated_blur_is_debounced() {
        let settings = SessionSettings { violation_threshold: 5, ..SessionSettings::default() };
        let mut monitor = IntegrityMonitor::new(&settings);
        let start = Instant::now();

        assert!(counted(&monitor.on_blur(start)));
        assert_eq!(monitor.on_blur(start + Duration::from_millis(50)), Verdict::Ignored);
        assert_eq!(monitor.count(), 1);
        assert!(counted(&monitor.on_blur(start + Duration::from_millis(150))));
        assert_eq!(monitor.count(), 2);
    }

    #[test]
    fn blur_is_ignored_while_report_modal_is_open() {
        let mut monitor = monitor();
        monitor.set_report_open(true);
        assert_eq!(monitor.on_blur(Instant::now()), Verdict::Ignored);

        monitor.set_report_open(false);
        assert!(counted(&monitor.on_blur(Instant::now())));
    }

    #[test]
    fn clipboard_inside_fields_is_allowed() {
        let mut monitor = monitor();
        for target in [EventTarget::Input, EventTarget::TextArea, EventTarget::ReportForm] {
            assert_eq!(monitor.on_clipboard(ClipboardAction::Paste, target), Verdict::Ignored);
            assert!(!prevents_default(&WindowEvent::Clipboard {
                action: ClipboardAction::Paste,
                target
            }));
        }
        assert_eq!(monitor.count(), 0);

        let verdict = monitor.on_clipboard(ClipboardAction::Copy, EventTarget::Page);
        assert!(matches!(
            verdict,
            Verdict::Counted { ref violation, .. } if violation.reason == "Copy operation detected"
        ));
        assert!(prevents_default(&WindowEvent::Clipboard {
            action: ClipboardAction::Cut,
            target: EventTarget::Page
        }));
    }

    #[test]
    fn devtools_window_counts_once_per_opening() {
        let settings = SessionSettings { violation_threshold: 10, ..SessionSettings::default() };
        let mut monitor = IntegrityMonitor::new(&settings);
        assert_eq!(monitor.probe_devtools(), Verdict::Ignored);

        let docked = WindowMetrics {
            outer_width: 1920,
            outer_height: 1080,
            inner_width: 1400,
            inner_height: 950,
        };
        monitor.observe_metrics(docked);
        assert!(counted(&monitor.probe_devtools()));
        assert_eq!(monitor.probe_devtools(), Verdict::Ignored);

        monitor.observe_metrics(WindowMetrics { inner_width: 1920, ..docked });
        assert_eq!(monitor.probe_devtools(), Verdict::Ignored);
        monitor.observe_metrics(docked);
        assert!(counted(&monitor.probe_devtools()));
        assert_eq!(monitor.count(), 2);
    }

    #[test]
    fn disarmed_monitor_counts_nothing() {
        let mut monitor = monitor();
        monitor.disarm();
        assert_eq!(monitor.on_context_menu(), Verdict::Ignored);
        assert_eq!(monitor.on_key(&KeyChord::key("F12")), Verdict::Ignored);
        assert_eq!(monitor.count(), 0);
        assert!(prevents_default(&WindowEvent::KeyDown(KeyChord::key("F12"))));
    }

    #[test]
    fn rearmed_monitor_counts_again() {
        let mut monitor = monitor();
        monitor.disarm();
        assert_eq!(monitor.on_context_menu(), Verdict::Ignored);
        monitor.arm();
        assert!(matches!(
            monitor.on_context_menu(),
            Verdict::Counted { count: 1, threshold_reached: true, .. }
        ));
    }
}

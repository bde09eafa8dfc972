//! Page-level events delivered to an exam session.
//!
//! A host (browser shell, terminal driver, tests) owns a [`WindowEvents`] hub and emits
//! events into it. A session subscribes on entry and gets a [`Subscription`] guard; dropping
//! the guard unregisters every listener it added.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum EventKind {
    Blur,
    Focus,
    KeyDown,
    ContextMenu,
    Copy,
    Paste,
    Cut,
    VisibilityChange,
    BeforeUnload,
    Unload,
    Resize,
}

pub(crate) const ALL_EVENT_KINDS: [EventKind; 11] = [
    EventKind::Blur,
    EventKind::Focus,
    EventKind::KeyDown,
    EventKind::ContextMenu,
    EventKind::Copy,
    EventKind::Paste,
    EventKind::Cut,
    EventKind::VisibilityChange,
    EventKind::BeforeUnload,
    EventKind::Unload,
    EventKind::Resize,
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct KeyChord {
    pub(crate) key: String,
    pub(crate) ctrl: bool,
    pub(crate) shift: bool,
    pub(crate) alt: bool,
    pub(crate) meta: bool,
}

impl KeyChord {
    #[cfg(test)]
    pub(crate) fn key(key: &str) -> Self {
        Self { key: key.to_string(), ..Self::default() }
    }

    /// Parses chords written like `ctrl+shift+i`, `cmd+alt+j` or `F12`.
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        let mut chord = KeyChord::default();
        for part in raw.split('+').map(str::trim) {
            match part.to_ascii_lowercase().as_str() {
                "" => return None,
                "ctrl" | "control" => chord.ctrl = true,
                "shift" => chord.shift = true,
                "alt" | "option" | "opt" => chord.alt = true,
                "meta" | "cmd" | "command" | "super" => chord.meta = true,
                _ if chord.key.is_empty() => chord.key = part.to_string(),
                _ => return None,
            }
        }
        if chord.key.is_empty() {
            return None;
        }
        Some(chord)
    }

    pub(crate) fn is_key(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClipboardAction {
    Copy,
    Paste,
    Cut,
}

impl ClipboardAction {
    fn kind(self) -> EventKind {
        match self {
            ClipboardAction::Copy => EventKind::Copy,
            ClipboardAction::Paste => EventKind::Paste,
            ClipboardAction::Cut => EventKind::Cut,
        }
    }
}

/// Where a clipboard event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventTarget {
    Input,
    TextArea,
    ReportForm,
    Page,
}

impl EventTarget {
    /// Form fields and the issue-report form may use the clipboard freely.
    pub(crate) fn allows_clipboard(self) -> bool {
        matches!(self, EventTarget::Input | EventTarget::TextArea | EventTarget::ReportForm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WindowMetrics {
    pub(crate) outer_width: u32,
    pub(crate) outer_height: u32,
    pub(crate) inner_width: u32,
    pub(crate) inner_height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WindowEvent {
    Blur,
    Focus,
    KeyDown(KeyChord),
    ContextMenu,
    Clipboard { action: ClipboardAction, target: EventTarget },
    VisibilityChange(Visibility),
    BeforeUnload,
    Unload,
    Resize(WindowMetrics),
}

impl WindowEvent {
    pub(crate) fn kind(&self) -> EventKind {
        match self {
            WindowEvent::Blur => EventKind::Blur,
            WindowEvent::Focus => EventKind::Focus,
            WindowEvent::KeyDown(_) => EventKind::KeyDown,
            WindowEvent::ContextMenu => EventKind::ContextMenu,
            WindowEvent::Clipboard { action, .. } => action.kind(),
            WindowEvent::VisibilityChange(_) => EventKind::VisibilityChange,
            WindowEvent::BeforeUnload => EventKind::BeforeUnload,
            WindowEvent::Unload => EventKind::Unload,
            WindowEvent::Resize(_) => EventKind::Resize,
        }
    }
}

/// Decides synchronously whether an event's default action is suppressed.
pub(crate) type PreventPolicy = fn(&WindowEvent) -> bool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Dispatch {
    pub(crate) delivered: usize,
    pub(crate) default_prevented: bool,
}

struct Listener {
    kinds: Vec<EventKind>,
    prevent: PreventPolicy,
    sender: mpsc::UnboundedSender<WindowEvent>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<u64, Listener>,
}

#[derive(Clone, Default)]
pub(crate) struct WindowEvents {
    registry: Arc<Mutex<Registry>>,
}

impl WindowEvents {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe(
        &self,
        kinds: &[EventKind],
        prevent: PreventPolicy,
    ) -> (Subscription, mpsc::UnboundedReceiver<WindowEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(id, Listener { kinds: kinds.to_vec(), prevent, sender });

        (Subscription { id, registry: Arc::downgrade(&self.registry) }, receiver)
    }

    pub(crate) fn emit(&self, event: WindowEvent) -> Dispatch {
        let kind = event.kind();
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);

        let mut dispatch = Dispatch { delivered: 0, default_prevented: false };
        for listener in registry.listeners.values().filter(|listener| listener.kinds.contains(&kind))
        {
            if (listener.prevent)(&event) {
                dispatch.default_prevented = true;
            }
            if listener.sender.send(event.clone()).is_ok() {
                dispatch.delivered += 1;
            }
        }
        dispatch
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner).listeners.len()
    }
}

/// Registered listeners; unregistered on drop.
pub(crate) struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().unwrap_or_else(PoisonError::into_inner).listeners.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prevent_context_menu(event: &WindowEvent) -> bool {
        matches!(event, WindowEvent::ContextMenu)
    }

    #[test]
    fn key_chord_parse_variants() {
        let chord = KeyChord::parse("Ctrl+Shift+I").expect("chord");
        assert!(chord.ctrl && chord.shift && !chord.alt && !chord.meta);
        assert!(chord.is_key("i"));

        let mac = KeyChord::parse("cmd+option+j").expect("mac chord");
        assert!(mac.meta && mac.alt);
        assert!(mac.is_key("J"));

        assert_eq!(KeyChord::parse("F12"), Some(KeyChord::key("F12")));
        assert_eq!(KeyChord::parse("ctrl+"), None);
        assert_eq!(KeyChord::parse("ctrl+shift"), None);
        assert_eq!(KeyChord::parse("a+b"), None);
    }

    #[tokio::test]
    async fn emit_reaches_only_matching_listeners() {
        let window = WindowEvents::new();
        let (_blur_sub, mut blur_rx) = window.subscribe(&[EventKind::Blur], |_| false);
        let (_menu_sub, mut menu_rx) =
            window.subscribe(&[EventKind::ContextMenu], prevent_context_menu);

        let dispatch = window.emit(WindowEvent::ContextMenu);
        assert_eq!(dispatch, Dispatch { delivered: 1, default_prevented: true });
        assert_eq!(menu_rx.recv().await, Some(WindowEvent::ContextMenu));
        assert!(blur_rx.try_recv().is_err());

        let dispatch = window.emit(WindowEvent::Blur);
        assert_eq!(dispatch, Dispatch { delivered: 1, default_prevented: false });
        assert_eq!(blur_rx.recv().await, Some(WindowEvent::Blur));
    }

    #[test]
    fn dropping_subscription_removes_listeners() {
        let window = WindowEvents::new();
        let (subscription, _rx) = window.subscribe(&ALL_EVENT_KINDS, prevent_context_menu);
        assert_eq!(window.listener_count(), 1);

        drop(subscription);
        assert_eq!(window.listener_count(), 0);

        let dispatch = window.emit(WindowEvent::ContextMenu);
        assert_eq!(dispatch, Dispatch { delivered: 0, default_prevented: false });
    }

    #[test]
    fn clipboard_events_map_to_their_kind() {
        let event =
            WindowEvent::Clipboard { action: ClipboardAction::Paste, target: EventTarget::Page };
        assert_eq!(event.kind(), EventKind::Paste);
        assert!(EventTarget::TextArea.allows_clipboard());
        assert!(!EventTarget::Page.allows_clipboard());
    }
}

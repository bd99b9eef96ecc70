use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::error::ClipboardError;
use crate::violation::Channel;

pub const DEVTOOLS_REASON: &str = "Developer tools access blocked.";
pub const SCREENSHOT_TOOL_REASON: &str = "Screenshot tool shortcut blocked.";
pub const PRINT_SCREEN_REASON: &str = "Screenshot attempt detected (PrintScreen).";
pub const WINDOW_SWITCH_REASON: &str = "Window switching shortcut blocked.";
pub const COPY_PASTE_SHORTCUT_REASON: &str = "Copy/Paste shortcuts blocked.";
pub const SELECT_ALL_REASON: &str = "Select all blocked.";
pub const PRINT_REASON: &str = "Print shortcut blocked.";

/// Kind of element an intercepted signal targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    TextInput,
    TextArea,
    ContentEditable,
    CodeEditor,
    Document,
}

impl Surface {
    pub fn is_editable(self) -> bool {
        !matches!(self, Surface::Document)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ClipboardOp {
    Copy,
    Cut,
    Paste,
    #[strum(serialize = "write")]
    WriteText,
    #[strum(serialize = "read")]
    ReadText,
}

impl ClipboardOp {
    pub fn reason(self) -> &'static str {
        match self {
            ClipboardOp::Copy => "Copy blocked.",
            ClipboardOp::Cut => "Cut blocked.",
            ClipboardOp::Paste => "Paste blocked.",
            ClipboardOp::WriteText => "Clipboard copy via API blocked.",
            ClipboardOp::ReadText => "Clipboard paste via API blocked.",
        }
    }
}

/// Raw host signals the guard inspects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardSignal {
    Clipboard { op: ClipboardOp, target: Surface },
    Key { key: KeyEvent, target: Surface },
    ContextMenu { target: Surface },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strike {
    pub channel: Channel,
    pub reason: &'static str,
}

/// Verdict for one signal: whether the host must cancel the default action
/// and stop propagation, and which channel (if any) the attempt counts against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interception {
    pub blocked: bool,
    pub strike: Option<Strike>,
}

impl Interception {
    pub fn allow() -> Self {
        Self {
            blocked: false,
            strike: None,
        }
    }

    pub fn silent_block() -> Self {
        Self {
            blocked: true,
            strike: None,
        }
    }

    fn block(channel: Channel, reason: &'static str) -> Self {
        Self {
            blocked: true,
            strike: Some(Strike { channel, reason }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputGuard {
    active: bool,
}

impl InputGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn inspect(&self, signal: &GuardSignal) -> Interception {
        if !self.active {
            return Interception::allow();
        }
        match signal {
            // copy/cut/paste are blocked on every surface, code editor included
            GuardSignal::Clipboard { op, .. } => Interception::block(Channel::Keyboard, op.reason()),
            GuardSignal::ContextMenu { target } => {
                if target.is_editable() {
                    Interception::allow()
                } else {
                    Interception::silent_block()
                }
            }
            GuardSignal::Key { key, target } => inspect_key(key, *target),
        }
    }
}

fn inspect_key(key: &KeyEvent, target: Surface) -> Interception {
    if key.kind == KeyEventKind::Release {
        return Interception::allow();
    }

    let mods = key.modifiers;
    let ctrl = mods.contains(KeyModifiers::CONTROL);
    let shift = mods.contains(KeyModifiers::SHIFT);
    let alt = mods.contains(KeyModifiers::ALT);
    let sup = mods.intersects(KeyModifiers::SUPER | KeyModifiers::META);
    let primary = ctrl || sup;
    let ch = match key.code {
        KeyCode::Char(c) => Some(c.to_ascii_lowercase()),
        _ => None,
    };

    if key.code == KeyCode::F(12) {
        return Interception::block(Channel::General, DEVTOOLS_REASON);
    }
    if ctrl && shift && matches!(ch, Some('i' | 'j' | 'c' | 'k')) {
        return Interception::block(Channel::General, DEVTOOLS_REASON);
    }
    if sup && shift && ch == Some('s') {
        return Interception::block(Channel::General, SCREENSHOT_TOOL_REASON);
    }
    if key.code == KeyCode::PrintScreen {
        return Interception::block(Channel::General, PRINT_SCREEN_REASON);
    }
    if alt && matches!(key.code, KeyCode::Tab | KeyCode::Char(' ') | KeyCode::F(4)) {
        return Interception::block(Channel::General, WINDOW_SWITCH_REASON);
    }
    if !primary {
        return Interception::allow();
    }

    match ch {
        Some('c' | 'v' | 'x') => Interception::block(Channel::Keyboard, COPY_PASTE_SHORTCUT_REASON),
        Some('a') if !target.is_editable() => {
            Interception::block(Channel::Keyboard, SELECT_ALL_REASON)
        }
        Some('p') if !target.is_editable() => Interception::block(Channel::General, PRINT_REASON),
        _ => Interception::allow(),
    }
}

/// Clipboard capability handed to the exam host
pub trait ClipboardGateway {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError>;
    fn read_text(&mut self) -> Result<String, ClipboardError>;
}

/// In-process clipboard for hosts without access to a system clipboard
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    contents: Option<String>,
}

impl ClipboardGateway for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.contents = Some(text.to_string());
        Ok(())
    }

    fn read_text(&mut self) -> Result<String, ClipboardError> {
        self.contents.clone().ok_or(ClipboardError::Unavailable)
    }
}

/// Wraps the real clipboard. While engaged every call is rejected; releasing
/// restores pass-through to the wrapped implementation.
pub struct ClipboardGate {
    inner: Box<dyn ClipboardGateway>,
    engaged: bool,
}

impl std::fmt::Debug for ClipboardGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipboardGate")
            .field("engaged", &self.engaged)
            .finish_non_exhaustive()
    }
}

impl Default for ClipboardGate {
    fn default() -> Self {
        Self::new(Box::new(MemoryClipboard::default()))
    }
}

impl ClipboardGate {
    pub fn new(inner: Box<dyn ClipboardGateway>) -> Self {
        Self {
            inner,
            engaged: false,
        }
    }

    pub fn engage(&mut self) {
        self.engaged = true;
    }

    pub fn release(&mut self) {
        self.engaged = false;
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }
}

impl ClipboardGateway for ClipboardGate {
    fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        if self.engaged {
            return Err(ClipboardError::Blocked(ClipboardOp::WriteText));
        }
        self.inner.write_text(text)
    }

    fn read_text(&mut self) -> Result<String, ClipboardError> {
        if self.engaged {
            return Err(ClipboardError::Blocked(ClipboardOp::ReadText));
        }
        self.inner.read_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> GuardSignal {
        GuardSignal::Key {
            key: KeyEvent::new(code, modifiers),
            target: Surface::Document,
        }
    }

    fn active_guard() -> InputGuard {
        let mut guard = InputGuard::new();
        guard.activate();
        guard
    }

    #[test]
    fn test_inactive_guard_allows_everything() {
        let guard = InputGuard::new();
        let signal = GuardSignal::Clipboard {
            op: ClipboardOp::Copy,
            target: Surface::Document,
        };
        assert_eq!(guard.inspect(&signal), Interception::allow());
    }

    #[test]
    fn test_clipboard_events_blocked_on_every_surface() {
        let guard = active_guard();
        for target in [
            Surface::Document,
            Surface::TextArea,
            Surface::TextInput,
            Surface::ContentEditable,
            Surface::CodeEditor,
        ] {
            for op in [ClipboardOp::Copy, ClipboardOp::Cut, ClipboardOp::Paste] {
                let verdict = guard.inspect(&GuardSignal::Clipboard { op, target });
                assert!(verdict.blocked);
                assert_eq!(verdict.strike.map(|s| s.channel), Some(Channel::Keyboard));
            }
        }
    }

    #[test]
    fn test_context_menu_exempt_on_editable_surfaces() {
        let guard = active_guard();
        let on_textarea = guard.inspect(&GuardSignal::ContextMenu {
            target: Surface::TextArea,
        });
        assert!(!on_textarea.blocked);

        let on_div = guard.inspect(&GuardSignal::ContextMenu {
            target: Surface::Document,
        });
        assert!(on_div.blocked);
        assert_eq!(on_div.strike, None);
    }

    #[test]
    fn test_copy_paste_shortcuts() {
        let guard = active_guard();
        for c in ['c', 'v', 'x'] {
            let verdict = guard.inspect(&key(KeyCode::Char(c), KeyModifiers::CONTROL));
            assert_eq!(
                verdict.strike,
                Some(Strike {
                    channel: Channel::Keyboard,
                    reason: COPY_PASTE_SHORTCUT_REASON
                })
            );
        }
        let cmd_v = guard.inspect(&key(KeyCode::Char('v'), KeyModifiers::SUPER));
        assert!(cmd_v.blocked);
    }

    #[test]
    fn test_select_all_and_print_only_outside_editable() {
        let guard = active_guard();
        let select = guard.inspect(&key(KeyCode::Char('a'), KeyModifiers::CONTROL));
        assert_eq!(select.strike.map(|s| s.channel), Some(Channel::Keyboard));

        let print = guard.inspect(&key(KeyCode::Char('p'), KeyModifiers::CONTROL));
        assert_eq!(print.strike.map(|s| s.channel), Some(Channel::General));

        let in_editor = guard.inspect(&GuardSignal::Key {
            key: KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL),
            target: Surface::CodeEditor,
        });
        assert_eq!(in_editor, Interception::allow());
    }

    #[test]
    fn test_devtools_shortcuts() {
        let guard = active_guard();
        let f12 = guard.inspect(&key(KeyCode::F(12), KeyModifiers::NONE));
        assert_eq!(f12.strike.map(|s| s.reason), Some(DEVTOOLS_REASON));

        for c in ['I', 'J', 'C', 'K'] {
            let verdict = guard.inspect(&key(
                KeyCode::Char(c),
                KeyModifiers::CONTROL | KeyModifiers::SHIFT,
            ));
            assert_eq!(verdict.strike.map(|s| s.reason), Some(DEVTOOLS_REASON));
            assert_eq!(verdict.strike.map(|s| s.channel), Some(Channel::General));
        }
    }

    #[test]
    fn test_screenshot_and_os_switch_shortcuts() {
        let guard = active_guard();
        let prt = guard.inspect(&key(KeyCode::PrintScreen, KeyModifiers::NONE));
        assert_eq!(prt.strike.map(|s| s.reason), Some(PRINT_SCREEN_REASON));

        let snip = guard.inspect(&key(
            KeyCode::Char('S'),
            KeyModifiers::SUPER | KeyModifiers::SHIFT,
        ));
        assert_eq!(snip.strike.map(|s| s.reason), Some(SCREENSHOT_TOOL_REASON));

        for code in [KeyCode::Tab, KeyCode::Char(' '), KeyCode::F(4)] {
            let verdict = guard.inspect(&key(code, KeyModifiers::ALT));
            assert_eq!(verdict.strike.map(|s| s.reason), Some(WINDOW_SWITCH_REASON));
        }
    }

    #[test]
    fn test_plain_typing_passes_through() {
        let guard = active_guard();
        assert_eq!(
            guard.inspect(&key(KeyCode::Char('c'), KeyModifiers::NONE)),
            Interception::allow()
        );
        assert_eq!(
            guard.inspect(&key(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Interception::allow()
        );
    }

    #[test]
    fn test_clipboard_gate_blocks_then_restores() {
        let mut gate = ClipboardGate::default();
        gate.write_text("before").unwrap();

        gate.engage();
        assert_eq!(
            gate.write_text("leak"),
            Err(ClipboardError::Blocked(ClipboardOp::WriteText))
        );
        assert_eq!(
            gate.read_text(),
            Err(ClipboardError::Blocked(ClipboardOp::ReadText))
        );

        gate.release();
        assert_eq!(gate.read_text().unwrap(), "before");
    }
}

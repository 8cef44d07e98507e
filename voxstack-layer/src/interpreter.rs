//! Pointer interpreters and the switch that routes events to them.
//!
//! The viewer owns one [`EventSwitch`] holding the interpreter that
//! currently receives pointer events. Clickable layers install their own
//! [`ClickInterpreter`] while they are selected and hand the previous one
//! back when deselected.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use voxstack_core::NDIM;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    Press,
    Release,
    Move,
}

/// A pointer event mapped to volume coordinates `(t, x, y, z, c)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub button: MouseButton,
    pub position: [usize; NDIM],
}

impl PointerEvent {
    #[must_use]
    pub fn press(button: MouseButton, position: [usize; NDIM]) -> Self {
        Self {
            kind: PointerKind::Press,
            button,
            position,
        }
    }
}

/// Consumer of pointer events.
pub trait Interpreter {
    /// Short name for logging.
    fn name(&self) -> &str;

    /// Handles `event`; returns true if it was consumed.
    fn handle(&mut self, event: &PointerEvent) -> bool;
}

/// Shared handle to an interpreter.
pub type InterpreterHandle = Rc<RefCell<dyn Interpreter>>;

/// Interpreter that consumes nothing, leaving events to the viewer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NavigationInterpreter;

impl Interpreter for NavigationInterpreter {
    fn name(&self) -> &str {
        "navigation"
    }

    fn handle(&mut self, _event: &PointerEvent) -> bool {
        false
    }
}

/// Routes pointer events to the installed interpreter.
pub struct EventSwitch {
    current: InterpreterHandle,
}

/// The switch is owned by the viewer and shared with clickable layers.
pub type SharedEventSwitch = Rc<RefCell<EventSwitch>>;

impl EventSwitch {
    #[must_use]
    pub fn new(initial: InterpreterHandle) -> Self {
        Self { current: initial }
    }

    /// A switch starting with a [`NavigationInterpreter`].
    #[must_use]
    pub fn shared() -> SharedEventSwitch {
        Rc::new(RefCell::new(Self::new(Rc::new(RefCell::new(
            NavigationInterpreter,
        )))))
    }

    /// Installs `interpreter` and returns the one it replaces.
    pub fn install(&mut self, interpreter: InterpreterHandle) -> InterpreterHandle {
        log::debug!(
            "event switch: {} -> {}",
            self.current.borrow().name(),
            interpreter.borrow().name()
        );
        std::mem::replace(&mut self.current, interpreter)
    }

    #[must_use]
    pub fn current(&self) -> InterpreterHandle {
        Rc::clone(&self.current)
    }

    /// Forwards `event` to the installed interpreter.
    pub fn dispatch(&self, event: &PointerEvent) -> bool {
        self.current.borrow_mut().handle(event)
    }
}

impl fmt::Debug for EventSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSwitch")
            .field("current", &self.current.borrow().name())
            .finish()
    }
}

/// Callback invoked with the clicked position.
pub type ClickHandler = Box<dyn FnMut([usize; NDIM])>;

/// Calls a handler when the configured button is pressed.
pub struct ClickInterpreter {
    button: MouseButton,
    on_click: ClickHandler,
}

impl ClickInterpreter {
    /// Reacts to the right button if `right`, else to the left one.
    #[must_use]
    pub fn new(right: bool, on_click: ClickHandler) -> Self {
        Self {
            button: if right {
                MouseButton::Right
            } else {
                MouseButton::Left
            },
            on_click,
        }
    }

    #[must_use]
    pub fn button(&self) -> MouseButton {
        self.button
    }
}

impl Interpreter for ClickInterpreter {
    fn name(&self) -> &str {
        "click"
    }

    fn handle(&mut self, event: &PointerEvent) -> bool {
        if event.kind != PointerKind::Press || event.button != self.button {
            return false;
        }
        (self.on_click)(event.position);
        true
    }
}

impl fmt::Debug for ClickInterpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickInterpreter")
            .field("button", &self.button)
            .finish_non_exhaustive()
    }
}

/// Installs a click interpreter while its layer is active.
///
/// Activation stores the interpreter it displaced and deactivation puts it
/// back, unless another interpreter was installed in the meantime. Repeated
/// calls with the same state do nothing. Dropping an active binding
/// deactivates it.
pub struct ClickBinding {
    switch: SharedEventSwitch,
    interpreter: InterpreterHandle,
    displaced: Option<InterpreterHandle>,
}

impl ClickBinding {
    #[must_use]
    pub fn new(switch: SharedEventSwitch, interpreter: ClickInterpreter) -> Self {
        Self {
            switch,
            interpreter: Rc::new(RefCell::new(interpreter)),
            displaced: None,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.displaced.is_some()
    }

    pub fn set_active(&mut self, active: bool) {
        match (active, self.displaced.take()) {
            (true, None) => {
                let previous = self
                    .switch
                    .borrow_mut()
                    .install(Rc::clone(&self.interpreter));
                self.displaced = Some(previous);
            }
            (false, Some(previous)) => {
                let mut switch = self.switch.borrow_mut();
                if Rc::ptr_eq(&switch.current, &self.interpreter) {
                    switch.install(previous);
                } else {
                    log::debug!(
                        "event switch: click binding released while '{}' is installed",
                        switch.current.borrow().name()
                    );
                }
            }
            (_, displaced) => self.displaced = displaced,
        }
    }
}

impl Drop for ClickBinding {
    fn drop(&mut self) {
        self.set_active(false);
    }
}

impl fmt::Debug for ClickBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClickBinding")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counting(right: bool) -> (ClickInterpreter, Rc<Cell<usize>>) {
        let clicks = Rc::new(Cell::new(0));
        let c = Rc::clone(&clicks);
        let interp = ClickInterpreter::new(right, Box::new(move |_| c.set(c.get() + 1)));
        (interp, clicks)
    }

    #[test]
    fn test_click_button_selection() {
        let (mut right, clicks) = counting(true);
        assert!(!right.handle(&PointerEvent::press(MouseButton::Left, [0; NDIM])));
        assert!(right.handle(&PointerEvent::press(MouseButton::Right, [0; NDIM])));
        assert_eq!(clicks.get(), 1);

        let (left, _) = counting(false);
        assert_eq!(left.button(), MouseButton::Left);
    }

    #[test]
    fn test_install_returns_previous() {
        let switch = EventSwitch::shared();
        let (interp, _) = counting(true);
        let prev = switch.borrow_mut().install(Rc::new(RefCell::new(interp)));
        assert_eq!(prev.borrow().name(), "navigation");
        assert_eq!(switch.borrow().current().borrow().name(), "click");
    }

    #[test]
    fn test_binding_is_idempotent() {
        let switch = EventSwitch::shared();
        let (interp, clicks) = counting(true);
        let mut binding = ClickBinding::new(Rc::clone(&switch), interp);

        binding.set_active(true);
        binding.set_active(true);
        assert!(switch
            .borrow()
            .dispatch(&PointerEvent::press(MouseButton::Right, [0, 1, 2, 3, 0])));
        assert_eq!(clicks.get(), 1);

        binding.set_active(false);
        binding.set_active(false);
        assert_eq!(switch.borrow().current().borrow().name(), "navigation");
    }

    #[test]
    fn test_release_keeps_later_install() {
        let switch = EventSwitch::shared();
        let (first, _) = counting(false);
        let (second, clicks) = counting(true);
        let mut a = ClickBinding::new(Rc::clone(&switch), first);
        let mut b = ClickBinding::new(Rc::clone(&switch), second);

        a.set_active(true);
        b.set_active(true);
        a.set_active(false);
        assert!(!a.is_active());
        assert!(switch
            .borrow()
            .dispatch(&PointerEvent::press(MouseButton::Right, [0; NDIM])));
        assert_eq!(clicks.get(), 1);

        b.set_active(false);
        assert!(!b.is_active());
    }

    #[test]
    fn test_drop_restores() {
        let switch = EventSwitch::shared();
        {
            let (interp, _) = counting(true);
            let mut binding = ClickBinding::new(Rc::clone(&switch), interp);
            binding.set_active(true);
        }
        assert_eq!(switch.borrow().current().borrow().name(), "navigation");
    }
}

//! Progress events for UI consumers.
//!
//! Listeners register per event kind (or for every kind) and are called
//! synchronously, in registration order, on every matching emit.

use std::fmt;

/// A progress notice from the task pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// A task has started planning
    Planning { task: String },
    /// A patch target is being read from disk
    ReadFile { path: String },
    /// A file is about to be written
    WriteFile { path: String },
    /// Rendered diffs of the applied patches.
    ///
    /// Only emitted when at least one patch applied; a task whose patches
    /// all fail goes from reads straight to its terminal event.
    Diffs { diffs: Vec<String> },
    /// A shell command is about to run
    RunCommand { command: String },
    /// The task finished
    Success {
        files_modified: Vec<String>,
        message: String,
    },
    /// The task failed
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Planning,
    ReadFile,
    WriteFile,
    Diffs,
    RunCommand,
    Success,
    Error,
}

impl AgentEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AgentEvent::Planning { .. } => EventKind::Planning,
            AgentEvent::ReadFile { .. } => EventKind::ReadFile,
            AgentEvent::WriteFile { .. } => EventKind::WriteFile,
            AgentEvent::Diffs { .. } => EventKind::Diffs,
            AgentEvent::RunCommand { .. } => EventKind::RunCommand,
            AgentEvent::Success { .. } => EventKind::Success,
            AgentEvent::Error { .. } => EventKind::Error,
        }
    }

    /// True for the events that end a task.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind(), EventKind::Success | EventKind::Error)
    }
}

impl fmt::Display for AgentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentEvent::Planning { task } => write!(f, "planning: {task}"),
            AgentEvent::ReadFile { path } => write!(f, "read {path}"),
            AgentEvent::WriteFile { path } => write!(f, "write {path}"),
            AgentEvent::Diffs { diffs } => write!(f, "{} diff(s) ready", diffs.len()),
            AgentEvent::RunCommand { command } => write!(f, "run {command}"),
            AgentEvent::Success { message, .. } => write!(f, "success: {message}"),
            AgentEvent::Error { message } => write!(f, "error: {message}"),
        }
    }
}

/// Handle returned by registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&AgentEvent)>;

struct Registration {
    id: ListenerId,
    kind: Option<EventKind>,
    listener: Listener,
}

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    registrations: Vec<Registration>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.registrations.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for one kind of event.
    pub fn on(
        &mut self,
        kind: EventKind,
        listener: impl FnMut(&AgentEvent) + 'static,
    ) -> ListenerId {
        self.register(Some(kind), Box::new(listener))
    }

    /// Register a listener for every event.
    pub fn on_any(&mut self, listener: impl FnMut(&AgentEvent) + 'static) -> ListenerId {
        self.register(None, Box::new(listener))
    }

    fn register(&mut self, kind: Option<EventKind>, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.registrations.push(Registration { id, kind, listener });
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|r| r.id != id);
        self.registrations.len() != before
    }

    pub fn emit(&mut self, event: AgentEvent) {
        let kind = event.kind();
        for registration in &mut self.registrations {
            if registration.kind.map_or(true, |k| k == kind) {
                (registration.listener)(&event);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registrations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_kind_filtering_and_fan_out() {
        let mut bus = EventBus::new();
        let writes = Rc::new(RefCell::new(Vec::new()));
        let all = Rc::new(RefCell::new(0));

        let w = Rc::clone(&writes);
        bus.on(EventKind::WriteFile, move |e| {
            if let AgentEvent::WriteFile { path } = e {
                w.borrow_mut().push(path.clone());
            }
        });
        let a = Rc::clone(&all);
        bus.on_any(move |_| *a.borrow_mut() += 1);

        bus.emit(AgentEvent::ReadFile {
            path: "a.txt".to_string(),
        });
        bus.emit(AgentEvent::WriteFile {
            path: "b.txt".to_string(),
        });

        assert_eq!(*writes.borrow(), vec!["b.txt".to_string()]);
        assert_eq!(*all.borrow(), 2);
    }

    #[test]
    fn test_unregister() {
        let mut bus = EventBus::new();
        let count = Rc::new(RefCell::new(0));
        let c = Rc::clone(&count);
        let id = bus.on(EventKind::Error, move |_| *c.borrow_mut() += 1);

        assert!(bus.off(id));
        assert!(!bus.off(id));
        bus.emit(AgentEvent::Error {
            message: "boom".to_string(),
        });

        assert_eq!(*count.borrow(), 0);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_terminal_events() {
        assert!(AgentEvent::Error {
            message: String::new()
        }
        .is_terminal());
        assert!(!AgentEvent::Planning {
            task: String::new()
        }
        .is_terminal());
    }
}

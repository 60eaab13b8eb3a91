//! Per-thread stack of active capture scopes

use std::cell::RefCell;
use std::marker::PhantomData;

use super::buffer::{Channel, OutputCapture};

thread_local! {
    static ACTIVE: RefCell<Vec<OutputCapture>> = const { RefCell::new(Vec::new()) };
}

/// Guard returned by [`OutputCapture::enter`]; leaving the scope pops it.
///
/// The guard is `!Send` so it cannot be held across an await point that
/// might resume on another thread.
#[must_use = "the capture scope ends when the guard is dropped"]
pub struct CaptureScope {
    _not_send: PhantomData<*const ()>,
}

impl Drop for CaptureScope {
    fn drop(&mut self) {
        ACTIVE.with(|active| {
            active.borrow_mut().pop();
        });
    }
}

impl OutputCapture {
    /// Make this capture the target of ambient writes on the current thread
    pub fn enter(&self) -> CaptureScope {
        ACTIVE.with(|active| active.borrow_mut().push(self.clone()));
        CaptureScope {
            _not_send: PhantomData,
        }
    }
}

/// Capture active on the current thread, if any
pub fn current() -> Option<OutputCapture> {
    ACTIVE.with(|active| active.borrow().last().cloned())
}

/// Write to the active capture. Returns false when no scope is active.
pub fn write_ambient(channel: Channel, text: &str) -> bool {
    match current() {
        Some(capture) => {
            capture.write_line(channel, text);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_scopes_restore() {
        let outer = OutputCapture::new();
        let inner = OutputCapture::new();

        assert!(current().is_none());
        {
            let _outer = outer.enter();
            write_ambient(Channel::StdOut, "a");
            {
                let _inner = inner.enter();
                write_ambient(Channel::StdOut, "b");
            }
            write_ambient(Channel::StdOut, "c");
        }
        assert!(current().is_none());
        assert!(!write_ambient(Channel::StdOut, "dropped"));

        assert_eq!(outer.snapshot().stdout, "a\nc\n");
        assert_eq!(inner.snapshot().stdout, "b\n");
    }

    #[test]
    fn test_scopes_are_thread_local() {
        let capture = OutputCapture::new();
        let _scope = capture.enter();

        std::thread::spawn(|| {
            assert!(current().is_none());
            assert!(!write_ambient(Channel::StdOut, "other thread"));
        })
        .join()
        .unwrap();

        assert!(capture.snapshot().is_empty());
    }
}

//! Apartment affinity
//!
//! Some test code must keep running on a thread bound to a single-threaded
//! apartment. Only Windows-like platforms have apartments; everywhere else
//! no affinity is ever required.

use std::cell::Cell;

/// Platform capability flag deciding whether apartments exist at all
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformFamily {
    WindowsLike,
    Other,
}

impl PlatformFamily {
    pub fn current() -> Self {
        if cfg!(windows) {
            PlatformFamily::WindowsLike
        } else {
            PlatformFamily::Other
        }
    }

    pub fn supports_apartments(self) -> bool {
        matches!(self, PlatformFamily::WindowsLike)
    }
}

/// Apartment a thread is bound to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Apartment {
    #[default]
    Unbound,
    SingleThreaded,
}

thread_local! {
    static APARTMENT: Cell<Apartment> = const { Cell::new(Apartment::Unbound) };
}

impl Apartment {
    /// Apartment of the calling thread
    pub fn current() -> Self {
        APARTMENT.with(Cell::get)
    }

    /// Record that the calling thread is bound to `self`
    pub fn bind_current_thread(self) {
        APARTMENT.with(|apartment| apartment.set(self));
    }
}

/// Where a bounded unit is dispatched
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerKind {
    Background,
    DedicatedAffine,
}

impl WorkerKind {
    /// A dedicated affine thread is needed iff the platform has apartments
    /// and the caller is already bound to a single-threaded one.
    pub fn select(platform: PlatformFamily, caller: Apartment) -> Self {
        if platform.supports_apartments() && caller == Apartment::SingleThreaded {
            WorkerKind::DedicatedAffine
        } else {
            WorkerKind::Background
        }
    }
}

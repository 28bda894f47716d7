use crate::presentation::PresentationHandle;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Keeps track of the one signing session that is allowed to be in flight.
#[derive(Default)]
pub struct SessionManager {
    current: Mutex<Option<CancellationToken>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token of the current session, if any, and installs a fresh
    /// one. Never suspends, so a new session supersedes the old one before it
    /// does any I/O.
    pub fn start_new_session(&self) -> CancellationToken {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = current.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        *current = Some(token.clone());
        token
    }

    /// Token of the most recently started session.
    pub fn current(&self) -> Option<CancellationToken> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// The presentation handle of one session, plus whether the wallet already
/// accepted the request.
///
/// Reveal, acceptance and close are decided under one lock, so the surface can
/// never be shown after acceptance or session cleanup has hidden it.
pub struct SessionSurface {
    handle: Box<dyn PresentationHandle>,
    state: Mutex<SurfaceState>,
}

#[derive(Default)]
struct SurfaceState {
    accepted: bool,
    closed: bool,
}

impl SessionSurface {
    pub fn new(handle: Box<dyn PresentationHandle>) -> Self {
        Self {
            handle,
            state: Mutex::new(SurfaceState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shows the surface unless the wallet accepted already or the session is
    /// over. Returns whether `show()` was called.
    pub fn reveal_unless_accepted(&self) -> bool {
        let state = self.state();
        if state.accepted || state.closed {
            return false;
        }
        self.handle.show();
        true
    }

    /// Records acceptance and hides the surface, whether or not it was shown.
    pub fn mark_accepted(&self) {
        let mut state = self.state();
        state.accepted = true;
        self.handle.hide();
    }

    pub fn is_accepted(&self) -> bool {
        self.state().accepted
    }

    /// Hides the surface for good.
    pub fn close(&self) {
        let mut state = self.state();
        state.closed = true;
        self.handle.hide();
    }
}

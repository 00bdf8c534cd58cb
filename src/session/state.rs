// -----------------------------------------------------------------------------
// ----- SessionState ----------------------------------------------------------

/// `Open -> Closing -> Closed`. Only the caller that moves a session out of
/// `Open` runs the close side effects.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closing,
    Closed,
}

impl SessionState {
    pub fn is_open(self) -> bool {
        self == SessionState::Open
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------

/// Why the client gave up on the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// An expired credential was seen but no session was believed to exist.
    NoSession,
    /// The refresh operation itself failed.
    RefreshFailed,
}

/// Session lifecycle notifications broadcast by the authenticated client.
///
/// `Terminated` is where a front end sends the user back to its login
/// surface; nothing further should be issued against that client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Refreshed,
    Terminated(TerminationReason),
}

impl TerminationReason {
    pub fn description(&self) -> &'static str {
        match self {
            TerminationReason::NoSession => "not logged in",
            TerminationReason::RefreshFailed => "session expired and could not be renewed",
        }
    }
}

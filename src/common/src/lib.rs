#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ShutdownMessage {
    // only use in initialize.
    Init,
    Cancel(String),
}

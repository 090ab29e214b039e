use std::time::Duration;

/// Whether a request is served from the target's sample data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StubBehavior {
    /// Send the request over the network.
    #[default]
    Never,
    /// Respond with the sample immediately.
    Immediate,
    /// Respond with the sample after a delay.
    Delayed(Duration),
}

impl StubBehavior {
    pub fn is_stubbed(&self) -> bool {
        !matches!(self, StubBehavior::Never)
    }
}

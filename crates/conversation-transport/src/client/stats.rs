/// Counters for one transport connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    received: u64,
    unparsable: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&mut self) {
        self.received += 1;
    }

    pub(crate) fn record_unparsable(&mut self) {
        self.unparsable += 1;
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn unparsable(&self) -> u64 {
        self.unparsable
    }
}

//! Per-download progress tracking

/// Progress of one in-flight download.
///
/// The reported percentage never decreases. Without a known total the
/// download sits at 0 until it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    total_bytes: Option<u64>,
    received_bytes: u64,
    percent: u8,
}

impl DownloadProgress {
    pub fn new(total_bytes: Option<u64>) -> Self {
        Self {
            total_bytes: total_bytes.filter(|total| *total > 0),
            received_bytes: 0,
            percent: 0,
        }
    }

    /// Record `bytes` more received. Returns the new percentage if it grew.
    pub fn advance(&mut self, bytes: u64) -> Option<u8> {
        self.received_bytes = self.received_bytes.saturating_add(bytes);
        let total = self.total_bytes?;

        // 100 is reserved for a persisted download
        let percent = ((self.received_bytes.saturating_mul(100)) / total).min(99) as u8;
        if percent > self.percent {
            self.percent = percent;
            Some(percent)
        } else {
            None
        }
    }

    pub fn complete(&mut self) -> u8 {
        self.percent = 100;
        self.percent
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }
}

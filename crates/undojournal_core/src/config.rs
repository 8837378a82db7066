//! Scanner and writer configuration.

/// Configuration for forward and backward scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// Whether a forward scan also reads each record's payload and trailer,
    /// checking the trailer against the header and the checksum against the
    /// bytes. Backward scans always do both.
    pub verify_trailer: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            verify_trailer: true,
        }
    }
}

impl ScanConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether forward scans verify trailers and checksums.
    #[must_use]
    pub const fn verify_trailer(mut self, value: bool) -> Self {
        self.verify_trailer = value;
        self
    }
}

/// Configuration for [`crate::JournalWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    /// Whether to flush the backend after every appended record.
    pub sync_on_write: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
        }
    }
}

impl WriterConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to flush after every record.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert!(ScanConfig::default().verify_trailer);
        assert!(WriterConfig::default().sync_on_write);
    }

    #[test]
    fn builders() {
        assert!(!ScanConfig::new().verify_trailer(false).verify_trailer);
        assert!(!WriterConfig::new().sync_on_write(false).sync_on_write);
    }
}

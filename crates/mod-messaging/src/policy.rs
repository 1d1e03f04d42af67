use std::collections::HashSet;

/// Channels that may receive sent messages.
///
/// Writes to chat channels are access-controlled; reads and listing are not.
/// An empty list is an open policy: every channel is writable.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    channels: HashSet<String>,
}

impl AllowList {
    pub fn open() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list of channel ids. Whitespace around ids is
    /// ignored, as are empty entries.
    pub fn from_csv(raw: &str) -> Self {
        raw.split(',').collect()
    }

    pub fn is_open(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn is_channel_allowed(&self, channel_id: &str) -> bool {
        self.is_open() || self.channels.contains(channel_id)
    }
}

impl<S: AsRef<str>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let channels = iter
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { channels }
    }
}

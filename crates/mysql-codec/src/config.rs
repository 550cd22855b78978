//! Codec configuration.

use mysql_protocol::MAX_PAYLOAD_LEN;

/// Default maximum size of a message frame (64 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Default initial capacity of read buffers (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Limits and buffer sizes shared by the readers and codecs.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Largest accepted frame length, tag included (default: 64 MiB).
    pub max_frame_size: usize,
    /// Initial capacity of the reassembly buffer (default: 8 KiB).
    pub read_buffer_size: usize,
    /// Largest payload per classic packet (default and maximum: 16 MiB - 1).
    pub max_packet_payload: usize,
    /// Drop inbound messages with unregistered tags instead of failing the
    /// asynchronous reader (default: false).
    pub ignore_unknown_messages: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_packet_payload: MAX_PAYLOAD_LEN,
            ignore_unknown_messages: false,
        }
    }
}

impl CodecConfig {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the largest accepted frame length.
    ///
    /// Values beyond what the 4-byte length field can express are clamped.
    #[must_use]
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size.min(u32::MAX as usize);
        self
    }

    /// Set the initial capacity of the reassembly buffer.
    #[must_use]
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the largest payload per classic packet.
    ///
    /// Values beyond what the 3-byte length field can express are clamped.
    #[must_use]
    pub fn max_packet_payload(mut self, size: usize) -> Self {
        self.max_packet_payload = size.clamp(1, MAX_PAYLOAD_LEN);
        self
    }

    /// Drop messages from newer servers that this client does not know,
    /// rather than treating them as a protocol violation.
    #[must_use]
    pub fn ignore_unknown_messages(mut self, ignore: bool) -> Self {
        self.ignore_unknown_messages = ignore;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CodecConfig::new();
        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(config.max_packet_payload, MAX_PAYLOAD_LEN);
        assert!(!config.ignore_unknown_messages);
    }

    #[test]
    fn test_clamping() {
        let config = CodecConfig::new()
            .max_frame_size(usize::MAX)
            .max_packet_payload(usize::MAX);
        assert_eq!(config.max_frame_size, u32::MAX as usize);
        assert_eq!(config.max_packet_payload, MAX_PAYLOAD_LEN);

        assert_eq!(CodecConfig::new().max_packet_payload(0).max_packet_payload, 1);
    }
}

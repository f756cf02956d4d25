use crate::{
    Error,
    Result,
};
use chrono_tz::Tz;

/// Default size of one string storage segment.
pub const DEFAULT_STRING_SEGMENT_SIZE: usize = 16 * 1024;

/// Codec settings shared by every reader and writer of a column tree
#[derive(Clone, Debug, PartialEq)]
pub struct CodecSettings {
    /// Minimum size of the segments string readers copy row bytes into
    pub string_segment_size: usize,
    /// Zone for DateTime/DateTime64 columns declared without one
    pub time_zone: Tz,
    /// Fail with a UTF-8 error instead of replacing invalid sequences when a
    /// String row is turned into a [`Value`](crate::Value)
    pub strict_utf8: bool,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            string_segment_size: DEFAULT_STRING_SEGMENT_SIZE,
            time_zone: Tz::UTC,
            strict_utf8: false,
        }
    }
}

impl CodecSettings {
    /// Create settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the string segment size (clamped to at least one byte)
    pub fn string_segment_size(mut self, size: usize) -> Self {
        self.string_segment_size = size.max(1);
        self
    }

    /// Set the default time zone
    pub fn time_zone(mut self, tz: Tz) -> Self {
        self.time_zone = tz;
        self
    }

    /// Set the default time zone by IANA name
    pub fn time_zone_name(self, name: &str) -> Result<Self> {
        let tz = parse_time_zone(name)?;
        Ok(self.time_zone(tz))
    }

    /// Enable or disable strict UTF-8 decoding of String rows
    pub fn strict_utf8(mut self, strict: bool) -> Self {
        self.strict_utf8 = strict;
        self
    }
}

pub(crate) fn parse_time_zone(name: &str) -> Result<Tz> {
    name.parse::<Tz>().map_err(|_| {
        Error::InvalidArgument(format!("Unknown time zone: {}", name))
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CodecSettings::new();
        assert_eq!(settings.string_segment_size, DEFAULT_STRING_SEGMENT_SIZE);
        assert_eq!(settings.time_zone, Tz::UTC);
        assert!(!settings.strict_utf8);
    }

    #[test]
    fn test_builder() {
        let settings = CodecSettings::new()
            .string_segment_size(0)
            .strict_utf8(true)
            .time_zone_name("Europe/Moscow")
            .unwrap();
        assert_eq!(settings.string_segment_size, 1);
        assert!(settings.strict_utf8);
        assert_eq!(settings.time_zone, Tz::Europe__Moscow);
    }

    #[test]
    fn test_unknown_time_zone() {
        assert!(matches!(
            CodecSettings::new().time_zone_name("Mars/Olympus"),
            Err(Error::InvalidArgument(_))
        ));
    }
}

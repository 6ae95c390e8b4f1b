use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::structs::burst::{BurstGeometry, ChannelLayout, Variant};
use crate::structs::preamble::BitDepth;
use crate::structs::timing::{FrameLayout, FrameRate, FrameTimingTable};
use crate::utils::errors::ConfigError;

/// Stream parameters shared by the encode and decode drivers.
///
/// # Example
///
/// ```rust
/// use s337m::structs::config::StreamConfig;
///
/// let config = StreamConfig::from_yaml_str(
///     "frame_rate: \"25\"\nvariant: legacy\nlayout:\n  pair: 0\nchannels: 2\n",
/// )?;
/// assert_eq!(config.bit_depth().bits(), 20);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StreamConfig {
    pub frame_rate: FrameRate,
    pub variant: Variant,
    #[serde(with = "serde_yaml_ng::with::singleton_map")]
    pub layout: ChannelLayout,
    /// Channels per PCM sample-set.
    pub channels: usize,
    /// Wrap depth; the variant default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<BitDepth>,
    /// Write a null burst into blocks with nothing to send.
    #[serde(default)]
    pub mark_empty_blocks: bool,
    /// Add the serial ADM assemble info word.
    #[serde(default)]
    pub assemble_info: bool,
    /// Decode without external video sync, inferring frames from burst
    /// spacing.
    #[serde(default)]
    pub no_vsync: bool,
}

impl StreamConfig {
    pub fn new(frame_rate: FrameRate, variant: Variant, layout: ChannelLayout, channels: usize) -> Self {
        Self {
            frame_rate,
            variant,
            layout,
            channels,
            bit_depth: None,
            mark_empty_blocks: false,
            assemble_info: false,
            no_vsync: false,
        }
    }

    pub fn with_bit_depth(mut self, depth: BitDepth) -> Self {
        self.bit_depth = Some(depth);
        self
    }

    pub fn with_mark_empty_blocks(mut self, mark: bool) -> Self {
        self.mark_empty_blocks = mark;
        self
    }

    pub fn with_assemble_info(mut self, assemble_info: bool) -> Self {
        self.assemble_info = assemble_info;
        self
    }

    pub fn with_no_vsync(mut self, no_vsync: bool) -> Self {
        self.no_vsync = no_vsync;
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).context("Invalid stream configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
            .unwrap_or_else(|| self.variant.default_bit_depth())
    }

    pub fn geometry(&self) -> BurstGeometry {
        BurstGeometry::new(self.variant, self.bit_depth(), self.layout, self.assemble_info)
    }

    pub fn frame_layout(&self, table: &FrameTimingTable) -> FrameLayout {
        FrameLayout::new(table, self.frame_rate, self.variant)
    }

    /// Checks channel addressing and that every block of the standard frame
    /// schedule can carry data.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_with(&FrameTimingTable::STANDARD)
    }

    /// Same as [`validate`](Self::validate), against the frame schedule of
    /// `table`.
    pub fn validate_with(&self, table: &FrameTimingTable) -> Result<(), ConfigError> {
        if self.channels == 0 {
            return Err(ConfigError::NoChannels);
        }

        match self.layout {
            ChannelLayout::Pair(_) if self.channels % 2 != 0 => {
                return Err(ConfigError::OddPairStride(self.channels));
            }
            ChannelLayout::Pair(first) if first + 1 >= self.channels => {
                return Err(ConfigError::ChannelOutOfRange {
                    channel: first + 1,
                    channels: self.channels,
                });
            }
            ChannelLayout::Single(channel) if channel >= self.channels => {
                return Err(ConfigError::ChannelOutOfRange {
                    channel,
                    channels: self.channels,
                });
            }
            _ => {}
        }

        if self.assemble_info && self.variant == Variant::Legacy {
            return Err(ConfigError::AssembleInfoWithoutSadm);
        }

        let layout = self.frame_layout(table);
        let geometry = self.geometry();
        let smallest = (0..layout.block_count())
            .map(|i| geometry.capacity_bits(layout.block_length(i)))
            .min()
            .unwrap_or(0);
        if smallest == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sadm_yaml() -> Result<()> {
        let yaml = r#"
frame_rate: "59.94"
variant: sadm
layout:
  single: 5
channels: 8
mark_empty_blocks: true
assemble_info: true
"#;
        let config = StreamConfig::from_yaml_str(yaml)?;

        assert_eq!(config.frame_rate, FrameRate::R59_94);
        assert_eq!(config.layout, ChannelLayout::Single(5));
        assert_eq!(config.bit_depth(), BitDepth::Bits24);
        assert!(config.assemble_info);
        assert!(!config.no_vsync);

        let again = StreamConfig::from_yaml_str(&config.to_yaml_string()?)?;
        assert_eq!(again, config);
        Ok(())
    }

    #[test]
    fn explicit_bit_depth() -> Result<()> {
        let yaml = "frame_rate: \"120\"\nvariant: legacy\nlayout:\n  pair: 2\nchannels: 4\nbit_depth: 16\n";
        let config = StreamConfig::from_yaml_str(yaml)?;
        assert_eq!(config.bit_depth(), BitDepth::Bits16);
        Ok(())
    }

    #[test]
    fn unknown_values_fail_loudly() {
        let rate = "frame_rate: \"48\"\nvariant: legacy\nlayout:\n  pair: 0\nchannels: 2\n";
        assert!(StreamConfig::from_yaml_str(rate).is_err());

        let depth = "frame_rate: \"25\"\nvariant: legacy\nlayout:\n  pair: 0\nchannels: 2\nbit_depth: 18\n";
        assert!(StreamConfig::from_yaml_str(depth).is_err());
    }

    #[test]
    fn reject_bad_channel_addressing() {
        let odd = StreamConfig::new(FrameRate::R25, Variant::Legacy, ChannelLayout::Pair(0), 3);
        assert!(matches!(odd.validate(), Err(ConfigError::OddPairStride(3))));

        let last_pair = StreamConfig::new(FrameRate::R25, Variant::Legacy, ChannelLayout::Pair(2), 4);
        assert!(last_pair.validate().is_ok());

        let past_end = StreamConfig::new(FrameRate::R25, Variant::Legacy, ChannelLayout::Pair(3), 4);
        assert!(matches!(
            past_end.validate(),
            Err(ConfigError::ChannelOutOfRange { channel: 4, channels: 4 })
        ));

        let single = StreamConfig::new(FrameRate::R25, Variant::SerialAdm, ChannelLayout::Single(1), 1);
        assert!(matches!(single.validate(), Err(ConfigError::ChannelOutOfRange { .. })));

        let empty = StreamConfig::new(FrameRate::R25, Variant::Legacy, ChannelLayout::Single(0), 0);
        assert!(matches!(empty.validate(), Err(ConfigError::NoChannels)));
    }

    #[test]
    fn capacity_checked_against_given_table() {
        let short = FrameTimingTable::new([64; FrameRate::COUNT]);

        for variant in [Variant::Legacy, Variant::SerialAdm] {
            let config = StreamConfig::new(FrameRate::R25, variant, ChannelLayout::Pair(0), 2);
            assert!(config.validate().is_ok());
            assert!(matches!(
                config.validate_with(&short),
                Err(ConfigError::ZeroCapacity)
            ));
        }
    }

    #[test]
    fn assemble_info_needs_sadm() {
        let config = StreamConfig::new(FrameRate::R30, Variant::Legacy, ChannelLayout::Pair(0), 2)
            .with_assemble_info(true);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::AssembleInfoWithoutSadm)
        ));
    }
}

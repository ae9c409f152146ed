use serde::Deserialize;

use crate::digest::DigestAlgorithm;
use crate::distribution::DEFAULT_FAILURE_PROBABILITY;
use crate::error::ConfigError;

pub const CONFIG_VERSION: u32 = 1;

/// Default source block size in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Default cap on the number of blocks combined into one packet.
pub const DEFAULT_MAX_BLOCKS_PER_PACKET: usize = 50;

/// Default ceiling on the message size a decoder will allocate for.
pub const DEFAULT_MAX_TOTAL_SIZE: u32 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FountainConfigInput {
    pub version: u32,
    pub encoder: EncoderConfigInput,
    pub decoder: DecoderConfigInput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EncoderConfigInput {
    pub block_size: Option<usize>,
    pub failure_probability: Option<f64>,
    pub max_blocks_per_packet: Option<usize>,
    pub digest: Option<String>,
    pub seed: Option<u64>,
    pub fps: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DecoderConfigInput {
    pub fallback_period: Option<u32>,
    pub max_total_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    pub block_size: usize,
    /// Robust soliton `delta`.
    pub failure_probability: f64,
    pub max_blocks_per_packet: usize,
    pub digest: DigestAlgorithm,
    /// Fixed PRNG seed; `None` seeds from the thread RNG.
    pub seed: Option<u64>,
    /// Emission rate for paced senders; `None` means unpaced.
    pub fps: Option<u32>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            failure_probability: DEFAULT_FAILURE_PROBABILITY,
            max_blocks_per_packet: DEFAULT_MAX_BLOCKS_PER_PACKET,
            digest: DigestAlgorithm::default(),
            seed: None,
            fps: None,
        }
    }
}

impl EncoderConfig {
    pub fn with_block_size(block_size: usize) -> Self {
        Self {
            block_size,
            ..Self::default()
        }
    }

    /// Parameter checks that do not depend on the payload.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if u32::try_from(self.block_size).is_err() {
            return Err(ConfigError::TooLarge("block size"));
        }
        if self.max_blocks_per_packet == 0 {
            return Err(ConfigError::ZeroMaxBlocks);
        }
        let delta = self.failure_probability;
        if !(delta.is_finite() && delta > 0.0 && delta < 1.0) {
            return Err(ConfigError::InvalidFailureProbability(delta));
        }
        if self.fps == Some(0) {
            return Err(ConfigError::ZeroFps);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Received packets between intersection-fallback scans. `None` uses the
    /// session's block count.
    pub fallback_period: Option<u32>,
    /// Largest `total_size` a first packet may declare. Session buffers are
    /// sized from the header, which the payload digest does not cover.
    pub max_total_size: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            fallback_period: None,
            max_total_size: DEFAULT_MAX_TOTAL_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FountainConfig {
    pub version: u32,
    pub encoder: EncoderConfig,
    pub decoder: DecoderConfig,
}

impl Default for FountainConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            encoder: EncoderConfig::default(),
            decoder: DecoderConfig::default(),
        }
    }
}

impl FountainConfigInput {
    pub fn resolve(self) -> Result<FountainConfig, ConfigError> {
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };
        if version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(version));
        }

        let defaults = EncoderConfig::default();
        let digest = match self.encoder.digest.as_deref().map(str::trim) {
            None | Some("") => defaults.digest,
            Some(name) => name.parse()?,
        };
        let encoder = EncoderConfig {
            block_size: self.encoder.block_size.unwrap_or(defaults.block_size),
            failure_probability: self
                .encoder
                .failure_probability
                .unwrap_or(defaults.failure_probability),
            max_blocks_per_packet: self
                .encoder
                .max_blocks_per_packet
                .unwrap_or(defaults.max_blocks_per_packet),
            digest,
            seed: self.encoder.seed,
            fps: self.encoder.fps,
        };
        encoder.validate()?;

        if self.decoder.fallback_period == Some(0) {
            return Err(ConfigError::ZeroFallbackPeriod);
        }
        if self.decoder.max_total_size == Some(0) {
            return Err(ConfigError::ZeroMaxTotalSize);
        }
        let decoder = DecoderConfig {
            fallback_period: self.decoder.fallback_period,
            max_total_size: self
                .decoder
                .max_total_size
                .unwrap_or(DEFAULT_MAX_TOTAL_SIZE),
        };

        Ok(FountainConfig {
            version,
            encoder,
            decoder,
        })
    }
}

impl FountainConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(FountainConfig::default());
        }
        let parsed: FountainConfigInput =
            toml::from_str(input).map_err(|e| ConfigError::Toml(e.to_string()))?;
        parsed.resolve()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_default() {
        let cfg = FountainConfig::from_toml_str("  \n").unwrap();
        assert_eq!(cfg, FountainConfig::default());
        assert_eq!(cfg.encoder.block_size, 1024);
        assert_eq!(cfg.encoder.max_blocks_per_packet, 50);
        assert_eq!(cfg.decoder.fallback_period, None);
        assert_eq!(cfg.decoder.max_total_size, DEFAULT_MAX_TOTAL_SIZE);
    }

    #[test]
    fn parse_toml_config_basic() {
        let toml = r#"
            version = 1

            [encoder]
            block_size = 400
            failure_probability = 0.05
            max_blocks_per_packet = 8
            digest = "sha-256"
            seed = 42
            fps = 30

            [decoder]
            fallback_period = 16
            max_total_size = 65536
        "#;
        let cfg = FountainConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.encoder.block_size, 400);
        assert_eq!(cfg.encoder.failure_probability, 0.05);
        assert_eq!(cfg.encoder.max_blocks_per_packet, 8);
        assert_eq!(cfg.encoder.digest, DigestAlgorithm::Sha256);
        assert_eq!(cfg.encoder.seed, Some(42));
        assert_eq!(cfg.encoder.fps, Some(30));
        assert_eq!(cfg.decoder.fallback_period, Some(16));
        assert_eq!(cfg.decoder.max_total_size, 65536);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let cfg = FountainConfig::from_toml_str("[encoder]\nblock_size = 64\n").unwrap();
        assert_eq!(cfg.encoder.block_size, 64);
        assert_eq!(cfg.encoder.failure_probability, DEFAULT_FAILURE_PROBABILITY);
        assert_eq!(cfg.decoder, DecoderConfig::default());
    }

    #[test]
    fn rejects_invalid_values() {
        let err = |s: &str| FountainConfig::from_toml_str(s).unwrap_err();
        assert_eq!(err("version = 2"), ConfigError::UnsupportedVersion(2));
        assert_eq!(err("[encoder]\nblock_size = 0"), ConfigError::ZeroBlockSize);
        assert_eq!(
            err("[encoder]\nmax_blocks_per_packet = 0"),
            ConfigError::ZeroMaxBlocks
        );
        assert_eq!(err("[encoder]\nfps = 0"), ConfigError::ZeroFps);
        assert_eq!(
            err("[encoder]\ndigest = \"blake3\""),
            ConfigError::UnsupportedDigest("blake3".into())
        );
        assert_eq!(
            err("[encoder]\nfailure_probability = 1.0"),
            ConfigError::InvalidFailureProbability(1.0)
        );
        assert_eq!(
            err("[decoder]\nfallback_period = 0"),
            ConfigError::ZeroFallbackPeriod
        );
        assert_eq!(
            err("[decoder]\nmax_total_size = 0"),
            ConfigError::ZeroMaxTotalSize
        );
        assert!(matches!(err("[encoder\n"), ConfigError::Toml(_)));
    }
}

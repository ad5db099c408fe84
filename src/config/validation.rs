use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("dispatcher.workers must be at least 1")]
    NoWorkers,

    #[error("dispatcher.channel_size must be at least 1")]
    ZeroChannelSize,

    #[error("decode.max_alloc must be positive")]
    ZeroDecodeBudget,

    #[error("Tier bound {tier} must be positive in both dimensions, got {width}x{height}")]
    EmptyTier {
        tier: &'static str,
        width: u32,
        height: u32,
    },

    #[error("mini tier {mini:?} is smaller than micro tier {micro:?}")]
    TierOrder { micro: [u32; 2], mini: [u32; 2] },

    #[error("Network timeout must be positive: {field}")]
    ZeroTimeout { field: &'static str },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_dispatcher(config)?;
    validate_decode(config)?;
    validate_tiers(config)?;
    validate_network(config)?;
    Ok(())
}

fn validate_dispatcher(config: &Config) -> Result<(), ValidationError> {
    if config.dispatcher.workers == 0 {
        return Err(ValidationError::NoWorkers);
    }
    if config.dispatcher.channel_size == 0 {
        return Err(ValidationError::ZeroChannelSize);
    }
    Ok(())
}

fn validate_decode(config: &Config) -> Result<(), ValidationError> {
    if config.decode.max_alloc.as_u64() == 0 {
        return Err(ValidationError::ZeroDecodeBudget);
    }
    Ok(())
}

/// Both tiers non-empty, and mini covers micro in each dimension
fn validate_tiers(config: &Config) -> Result<(), ValidationError> {
    let micro = config.handlers.micro_max;
    let mini = config.handlers.mini_max;

    for (tier, [width, height]) in [("micro", micro), ("mini", mini)] {
        if width == 0 || height == 0 {
            return Err(ValidationError::EmptyTier {
                tier,
                width,
                height,
            });
        }
    }

    if mini[0] < micro[0] || mini[1] < micro[1] {
        return Err(ValidationError::TierOrder { micro, mini });
    }
    Ok(())
}

fn validate_network(config: &Config) -> Result<(), ValidationError> {
    if config.network.connect_timeout_secs == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "connect_timeout_secs",
        });
    }
    if config.network.request_timeout_secs == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "request_timeout_secs",
        });
    }
    Ok(())
}

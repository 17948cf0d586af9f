//! crates/video_learning_core/src/credits.rs
//!
//! Client-side checks for credit purchases, done before anything reaches the backend.

/// Smallest custom purchase, in pounds.
pub const MIN_CUSTOM_AMOUNT: f64 = 1.0;
/// Largest custom purchase, in pounds.
pub const MAX_CUSTOM_AMOUNT: f64 = 1000.0;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CreditAmountError {
    #[error("Amount must be a number")]
    NotANumber,
    #[error("Minimum purchase is £{min:.0}, got £{amount:.2}")]
    BelowMinimum { amount: f64, min: f64 },
    #[error("Maximum purchase is £{max:.0}, got £{amount:.2}")]
    AboveMaximum { amount: f64, max: f64 },
}

/// A custom top-up amount in pounds that is known to be inside the allowed range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CustomCreditAmount(f64);

impl CustomCreditAmount {
    pub fn new(amount: f64) -> Result<Self, CreditAmountError> {
        if !amount.is_finite() {
            return Err(CreditAmountError::NotANumber);
        }
        if amount < MIN_CUSTOM_AMOUNT {
            return Err(CreditAmountError::BelowMinimum {
                amount,
                min: MIN_CUSTOM_AMOUNT,
            });
        }
        if amount > MAX_CUSTOM_AMOUNT {
            return Err(CreditAmountError::AboveMaximum {
                amount,
                max: MAX_CUSTOM_AMOUNT,
            });
        }
        Ok(Self(amount))
    }

    pub fn pounds(&self) -> f64 {
        self.0
    }

    pub fn pence(&self) -> u64 {
        (self.0 * 100.0).round() as u64
    }
}

/// Credits a video of the given length will consume: one per started minute.
pub fn estimate_processing_credits(duration_secs: f64) -> u32 {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return 0;
    }
    (duration_secs / 60.0).ceil() as u32
}

//! module parameters
//!
//! Parameters only change through [`crate::keeper::Keeper::set_params`], which
//! runs [`Params::validate`] on every write. Readers get a plain value and pass
//! it explicitly into the distribution engine and the draw scheduler.

use crate::error::{Error, Result};
use crate::types::coin::{tokens_from_power, Coin, DEFAULT_DENOM};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 100% in basis points
pub const BPS_ONE: u32 = 10_000;

/// Default draw duration
pub const DEFAULT_DRAW_DURATION: Duration = Duration::from_secs(60 * 60);

/// Shortest accepted draw duration
pub const MIN_DRAW_DURATION: Duration = Duration::from_secs(60);

/// Fixed-point fraction with basis point precision (1.00 == 10_000)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percentage(u32);

impl Percentage {
    pub const ZERO: Percentage = Percentage(0);
    pub const ONE: Percentage = Percentage(BPS_ONE);

    pub const fn from_bps(bps: u32) -> Self {
        Self(bps)
    }

    pub const fn from_percent(percent: u32) -> Self {
        Self(percent * 100)
    }

    pub fn bps(&self) -> u32 {
        self.0
    }

    pub fn checked_add(self, other: Percentage) -> Option<Percentage> {
        self.0.checked_add(other.0).map(Percentage)
    }

    /// `round(amount * self)`, rounding half to even
    pub fn apply_to(&self, amount: u128) -> Result<u128> {
        let scaled = amount
            .checked_mul(self.0 as u128)
            .ok_or_else(|| Error::Overflow(format!("{} * {}", amount, self)))?;
        let one = BPS_ONE as u128;
        let quotient = scaled / one;
        let remainder = scaled % one;
        let round_up = match (remainder * 2).cmp(&one) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => quotient % 2 == 1,
            std::cmp::Ordering::Less => false,
        };
        Ok(if round_up { quotient + 1 } else { quotient })
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:04}", self.0 / BPS_ONE, self.0 % BPS_ONE)
    }
}

impl FromStr for Percentage {
    type Err = Error;

    /// Parses decimal fractions such as `0.98`, `1`, `0.0125`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidParams(format!("invalid percentage value: {}", s));
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() || frac_part.len() > 4 {
            return Err(invalid());
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        let int: u32 = int_part.parse().map_err(|_| invalid())?;
        let mut frac: u32 = 0;
        for (i, c) in frac_part.chars().enumerate() {
            let digit = c.to_digit(10).ok_or_else(invalid)?;
            frac += digit * 10u32.pow(3 - i as u32);
        }
        int.checked_mul(BPS_ONE)
            .and_then(|v| v.checked_add(frac))
            .map(Percentage)
            .ok_or_else(invalid)
    }
}

impl Serialize for Percentage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Percentage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn validate_percentage_value(name: &str, value: Percentage) -> Result<()> {
    if value == Percentage::ZERO || value > Percentage::ONE {
        return Err(Error::InvalidParams(format!(
            "invalid {} percentage value: {}",
            name, value
        )));
    }
    Ok(())
}

// ============================================================================
// Distribution
// ============================================================================

/// Where the fee share of a ticket purchase goes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeDestination {
    CommunityPool,
    FeeCollector,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionParams {
    pub prize_percentage: Percentage,
    pub fee_percentage: Percentage,
    pub burn_percentage: Percentage,
    pub fee_destination: FeeDestination,
}

impl DistributionParams {
    pub fn new(prize: Percentage, fee: Percentage, burn: Percentage) -> Self {
        Self {
            prize_percentage: prize,
            fee_percentage: fee,
            burn_percentage: burn,
            fee_destination: FeeDestination::CommunityPool,
        }
    }

    pub fn with_fee_destination(mut self, destination: FeeDestination) -> Self {
        self.fee_destination = destination;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_percentage_value("prize", self.prize_percentage)?;
        validate_percentage_value("fee", self.fee_percentage)?;
        validate_percentage_value("burn", self.burn_percentage)?;

        let total = self
            .prize_percentage
            .checked_add(self.fee_percentage)
            .and_then(|p| p.checked_add(self.burn_percentage));
        if total != Some(Percentage::ONE) {
            return Err(Error::InvalidParams(
                "percentages does not sum to 1.00".into(),
            ));
        }
        Ok(())
    }
}

impl Default for DistributionParams {
    fn default() -> Self {
        Self::new(
            Percentage::from_percent(98),
            Percentage::from_percent(1),
            Percentage::from_percent(1),
        )
    }
}

// ============================================================================
// Draw
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawParams {
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// Distinct ticket owners required before a winner is drawn
    pub min_participants: u32,
    /// Carry an undrawn prize into the next draw
    pub rollover_prize: bool,
}

impl DrawParams {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            min_participants: 1,
            rollover_prize: true,
        }
    }

    pub fn with_min_participants(mut self, min_participants: u32) -> Self {
        self.min_participants = min_participants;
        self
    }

    pub fn with_rollover_prize(mut self, rollover_prize: bool) -> Self {
        self.rollover_prize = rollover_prize;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.duration < MIN_DRAW_DURATION {
            return Err(Error::InvalidParams(format!(
                "invalid draw duration param: {}s",
                self.duration.as_secs()
            )));
        }
        if self.min_participants == 0 {
            return Err(Error::InvalidParams(
                "min participants must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Whether a drawing may be held with this many owners and tickets
    pub fn is_eligible(&self, participants: usize, tickets: usize) -> bool {
        tickets > 0 && participants >= self.min_participants as usize
    }
}

impl Default for DrawParams {
    fn default() -> Self {
        Self::new(DEFAULT_DRAW_DURATION)
    }
}

// ============================================================================
// Ticket
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketParams {
    pub price: Coin,
}

impl TicketParams {
    pub fn new(price: Coin) -> Self {
        Self { price }
    }

    pub fn validate(&self) -> Result<()> {
        self.price
            .validate()
            .map_err(|e| Error::InvalidParams(format!("invalid ticket price param: {}", e)))?;
        if self.price.is_zero() {
            return Err(Error::InvalidParams("ticket price cannot be zero".into()));
        }
        Ok(())
    }
}

impl Default for TicketParams {
    fn default() -> Self {
        Self::new(Coin::new(DEFAULT_DENOM, tokens_from_power(10)))
    }
}

// ============================================================================
// Params
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    pub distribution: DistributionParams,
    pub draw: DrawParams,
    pub ticket: TicketParams,
}

impl Params {
    pub fn new(distribution: DistributionParams, draw: DrawParams, ticket: TicketParams) -> Self {
        Self {
            distribution,
            draw,
            ticket,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.distribution.validate()?;
        self.draw.validate()?;
        self.ticket.validate()
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

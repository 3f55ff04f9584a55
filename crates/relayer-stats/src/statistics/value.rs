// Fiat valuation of base-unit amounts

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::PriceIndexProvider;
use crate::types::{BaseDenom, PriceEntry};

/// Largest integer a `Decimal` mantissa holds (2^96 - 1)
const MAX_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;

const MAX_SCALE: i64 = 28;

/// Price and decimal scale per base denom, read once per run
#[derive(Debug, Clone, Default)]
pub struct PriceIndex {
    entries: HashMap<BaseDenom, PriceEntry>,
}

impl PriceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, denom: BaseDenom, entry: PriceEntry) {
        self.entries.insert(denom, entry);
    }

    pub fn get(&self, denom: &BaseDenom) -> Option<&PriceEntry> {
        self.entries.get(denom)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Join the base denom registry with coin prices. Denoms whose coin has
    /// no price are left out.
    pub async fn load(provider: &dyn PriceIndexProvider) -> Result<Self, StoreError> {
        let denoms = provider.base_denoms().await?;
        let prices = provider.coin_prices().await?;

        let mut index = Self::new();
        for info in denoms {
            match prices.get(&info.coin_id) {
                Some(price) => index.insert(
                    BaseDenom::new(info.denom, info.chain_id),
                    PriceEntry {
                        price: *price,
                        scale: info.scale,
                    },
                ),
                None => debug!(denom = %info.denom, coin_id = %info.coin_id, "No price for coin"),
            }
        }
        Ok(index)
    }

    /// Like [`PriceIndex::load`] but degrades to an empty index
    pub async fn load_or_empty(provider: &dyn PriceIndexProvider) -> Self {
        match Self::load(provider).await {
            Ok(index) => index,
            Err(e) => {
                warn!("Failed to load price index, all values will be zero: {}", e);
                Self::new()
            }
        }
    }
}

/// `amount / 10^scale` as a decimal.
///
/// Amounts wider than the mantissa drop trailing digits first so the
/// magnitude is kept. A result beyond `Decimal::MAX` saturates.
pub fn scaled_amount(amount: u128, scale: u32) -> Decimal {
    let mut mantissa = amount;
    let mut exponent = i64::from(scale);
    while mantissa > MAX_MANTISSA || exponent > MAX_SCALE {
        mantissa /= 10;
        exponent -= 1;
    }

    // mantissa <= MAX_MANTISSA so the cast and the constructor cannot fail
    let base = Decimal::from_i128_with_scale(mantissa as i128, exponent.max(0) as u32);
    if exponent >= 0 {
        return base;
    }

    let mut value = base;
    for _ in 0..(-exponent) {
        match value.checked_mul(Decimal::TEN) {
            Some(v) => value = v,
            None => return Decimal::MAX,
        }
    }
    value
}

/// Converts aggregated amounts into a fiat total with a [`PriceIndex`]
#[derive(Debug, Clone, Default)]
pub struct ValueCalculator {
    index: Arc<PriceIndex>,
}

impl ValueCalculator {
    pub fn new(index: Arc<PriceIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &PriceIndex {
        &self.index
    }

    /// Value of one amount; zero when the denom has no price entry
    pub fn value_of(&self, denom: &BaseDenom, amount: u128) -> Decimal {
        match self.index.get(denom) {
            Some(entry) => scaled_amount(amount, entry.scale).saturating_mul(entry.price),
            None => Decimal::ZERO,
        }
    }

    pub fn total_value<'a, I>(&self, amounts: I) -> Decimal
    where
        I: IntoIterator<Item = (&'a BaseDenom, u128)>,
    {
        amounts
            .into_iter()
            .fold(Decimal::ZERO, |acc, (denom, amount)| acc.saturating_add(self.value_of(denom, amount)))
    }
}

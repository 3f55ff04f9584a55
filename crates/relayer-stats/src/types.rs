// Entities and value types shared by the engine and the stores

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Port used when a chain has no explicit mapping for a channel
pub const DEFAULT_PORT: &str = "transfer";

const KEY_SEPARATOR: &str = "|";

/// Directional statistic key for traffic flowing from one channel end to the other.
pub fn statistic_key(src_chain: &str, src_channel: &str, dst_chain: &str, dst_channel: &str) -> String {
    [src_chain, src_channel, dst_chain, dst_channel].join(KEY_SEPARATOR)
}

/// Channel id that does not depend on which end is listed first.
pub fn canonical_channel_id(chain_a: &str, channel_a: &str, chain_b: &str, channel_b: &str) -> String {
    if (chain_a, channel_a) <= (chain_b, channel_b) {
        statistic_key(chain_a, channel_a, chain_b, channel_b)
    } else {
        statistic_key(chain_b, channel_b, chain_a, channel_a)
    }
}

/// A bidirectional relay path serviced by one relayer
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelPair {
    pub chain_a: String,
    pub channel_a: String,
    pub address_a: String,
    pub chain_b: String,
    pub channel_b: String,
    pub address_b: String,
}

impl ChannelPair {
    pub fn channel_id(&self) -> String {
        canonical_channel_id(&self.chain_a, &self.channel_a, &self.chain_b, &self.channel_b)
    }

    /// Keys for A→B and B→A, in that order
    pub fn statistic_keys(&self) -> (String, String) {
        (
            statistic_key(&self.chain_a, &self.channel_a, &self.chain_b, &self.channel_b),
            statistic_key(&self.chain_b, &self.channel_b, &self.chain_a, &self.channel_a),
        )
    }

    /// True when both ends match, in either orientation
    pub fn connects(&self, chain_x: &str, channel_x: &str, chain_y: &str, channel_y: &str) -> bool {
        (self.chain_a == chain_x && self.channel_a == channel_x && self.chain_b == chain_y && self.channel_b == channel_y)
            || (self.chain_a == chain_y && self.channel_a == channel_y && self.chain_b == chain_x && self.channel_b == channel_x)
    }

    /// Address slot of the end sitting on `chain`/`channel`
    pub fn address_on(&self, chain: &str, channel: &str) -> Option<&str> {
        if self.chain_a == chain && self.channel_a == channel {
            Some(&self.address_a)
        } else if self.chain_b == chain && self.channel_b == channel {
            Some(&self.address_b)
        } else {
            None
        }
    }

    /// Fill an empty address slot on the given end. Returns true if something changed.
    pub fn backfill_address(&mut self, chain: &str, channel: &str, address: &str) -> bool {
        if self.chain_a == chain && self.channel_a == channel && self.address_a.is_empty() {
            self.address_a = address.to_string();
            true
        } else if self.chain_b == chain && self.channel_b == channel && self.address_b.is_empty() {
            self.address_b = address.to_string();
            true
        } else {
            false
        }
    }
}

/// Lifetime totals kept on a relayer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayerTotals {
    pub total_txs: u64,
    pub success_total_txs: u64,
    pub transfer_value: Decimal,
    /// Fees paid by the relayer's addresses, priced like transfers
    #[serde(default)]
    pub fee_value: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relayer {
    pub relayer_id: String,
    #[serde(default)]
    pub relayer_name: String,
    pub channel_pairs: Vec<ChannelPair>,
    /// Latest client update seen on any of its channel pairs (unix seconds)
    pub update_time: i64,
    #[serde(default)]
    pub totals: RelayerTotals,
    #[serde(default)]
    pub create_at: i64,
    #[serde(default)]
    pub update_at: i64,
}

impl Relayer {
    /// Distinct (chain, address) pairs the relayer signs with
    pub fn addresses(&self) -> BTreeSet<(String, String)> {
        let mut out = BTreeSet::new();
        for pair in &self.channel_pairs {
            if !pair.address_a.is_empty() {
                out.insert((pair.chain_a.clone(), pair.address_a.clone()));
            }
            if !pair.address_b.is_empty() {
                out.insert((pair.chain_b.clone(), pair.address_b.clone()));
            }
        }
        out
    }

    pub fn chains(&self) -> BTreeSet<String> {
        self.channel_pairs
            .iter()
            .flat_map(|p| [p.chain_a.clone(), p.chain_b.clone()])
            .collect()
    }

    pub fn owns_address(&self, chain: &str, address: &str) -> bool {
        !address.is_empty()
            && self.channel_pairs.iter().any(|p| {
                (p.chain_a == chain && p.address_a == address) || (p.chain_b == chain && p.address_b == address)
            })
    }

    pub fn serves_chain(&self, chain: &str) -> bool {
        self.channel_pairs.iter().any(|p| p.chain_a == chain || p.chain_b == chain)
    }

    /// Every directional key of every pair
    pub fn statistic_keys(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for pair in &self.channel_pairs {
            let (forward, backward) = pair.statistic_keys();
            out.insert(forward);
            out.insert(backward);
        }
        out
    }
}

/// Half-open time window [start, end) in unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub start: i64,
    pub end: i64,
}

impl Segment {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Calendar day containing `now`, cut at midnight of `offset`
    pub fn today(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = now.with_timezone(&offset);
        let midnight = local.date_naive().and_time(NaiveTime::MIN);
        let start = offset
            .from_local_datetime(&midnight)
            .single()
            .map(|d| d.timestamp())
            .unwrap_or_else(|| now.timestamp() - now.timestamp().rem_euclid(86_400));
        Self::new(start, start + Duration::days(1).num_seconds())
    }

    pub fn yesterday(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let today = Self::today(now, offset);
        Self::new(today.start - Duration::days(1).num_seconds(), today.start)
    }

    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Day string used to scope retry counters
pub fn day_string(now: DateTime<Utc>, offset: FixedOffset) -> String {
    now.with_timezone(&offset).format("%Y-%m-%d").to_string()
}

/// Canonical origin-chain token identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BaseDenom {
    pub denom: String,
    pub chain_id: String,
}

impl BaseDenom {
    pub fn new(denom: impl Into<String>, chain_id: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            chain_id: chain_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Success,
    Failed,
    Processing,
    Refunded,
}

/// One transfer as returned by a segment scan of the transaction store.
/// `address` is the relayer that signed the receive on the destination chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentTransfer {
    pub address: String,
    pub sc_chain_id: String,
    pub sc_channel: String,
    pub dc_chain_id: String,
    pub dc_channel: String,
    pub base_denom: BaseDenom,
    pub status: TxStatus,
    /// Base units as a decimal string
    pub amount: String,
    pub tx_time: i64,
}

impl SegmentTransfer {
    pub fn statistic_key(&self) -> String {
        statistic_key(&self.sc_chain_id, &self.sc_channel, &self.dc_chain_id, &self.dc_channel)
    }
}

/// Light client update transaction recorded in the transaction store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateClientTx {
    pub chain_id: String,
    pub signer: String,
    pub client_id: String,
    pub tx_time: i64,
}

/// Composite key of a statistic record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatisticRecordKey {
    pub address: String,
    pub statistic_key: String,
    pub base_denom: BaseDenom,
    pub segment_start_time: i64,
    pub segment_end_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticRecord {
    pub address: String,
    pub statistic_key: String,
    pub base_denom: BaseDenom,
    pub segment_start_time: i64,
    pub segment_end_time: i64,
    pub total_txs: u64,
    pub success_total_txs: u64,
    #[serde(with = "amount_str")]
    pub transfer_amount: u128,
    pub create_at: i64,
    pub update_at: i64,
}

impl StatisticRecord {
    pub fn key(&self) -> StatisticRecordKey {
        StatisticRecordKey {
            address: self.address.clone(),
            statistic_key: self.statistic_key.clone(),
            base_denom: self.base_denom.clone(),
            segment_start_time: self.segment_start_time,
            segment_end_time: self.segment_end_time,
        }
    }
}

/// Stored amounts summed per (address, statistic key, base denom)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressDenomAmount {
    pub address: String,
    pub statistic_key: String,
    pub base_denom: BaseDenom,
    #[serde(with = "amount_str")]
    pub amount: u128,
}

/// Fee paid by a relayer address on one chain, as recorded by the fee indexer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayerFeeRecord {
    pub chain_id: String,
    pub address: String,
    pub fee_denom: String,
    #[serde(with = "amount_str")]
    pub amount: u128,
}

/// Fees summed per (address, chain, fee denom)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressFeeAmount {
    pub address: String,
    pub chain_id: String,
    pub fee_denom: String,
    #[serde(with = "amount_str")]
    pub amount: u128,
}

impl AddressFeeAmount {
    /// Fees are paid in a denom native to the chain they were paid on
    pub fn base_denom(&self) -> BaseDenom {
        BaseDenom::new(self.fee_denom.clone(), self.chain_id.clone())
    }
}

/// Stored tx counts summed per (address, statistic key)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressTxs {
    pub address: String,
    pub statistic_key: String,
    pub total_txs: u64,
    pub success_total_txs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: String,
    /// LCD base url
    pub lcd: String,
    /// Client state path with `{channel_id}` and `{port_id}` placeholders
    pub client_state_path: String,
    /// channel id -> port id, for channels not bound to the transfer port
    #[serde(default)]
    pub channel_ports: HashMap<String, String>,
}

impl ChainConfig {
    pub fn port_for_channel(&self, channel_id: &str) -> &str {
        self.channel_ports
            .get(channel_id)
            .map(String::as_str)
            .unwrap_or(DEFAULT_PORT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub price: Decimal,
    pub scale: u32,
}

/// Base denom registry row used to build the price index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseDenomInfo {
    pub denom: String,
    pub chain_id: String,
    pub coin_id: String,
    pub scale: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: String,
    pub chain_a: String,
    pub channel_a: String,
    pub chain_b: String,
    pub channel_b: String,
    #[serde(default)]
    pub relayers: u64,
    #[serde(default)]
    pub update_time: i64,
    #[serde(default)]
    pub update_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub chain_id: String,
    #[serde(default)]
    pub relayers: u64,
    #[serde(default)]
    pub update_at: i64,
}

/// Serialize u128 base-unit amounts as decimal strings
pub mod amount_str {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u128>().map_err(D::Error::custom)
    }
}

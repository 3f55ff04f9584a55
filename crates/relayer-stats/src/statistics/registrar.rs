// Registers relayers first seen in transfer traffic

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::metrics::EngineMetrics;
use crate::store::RelayerStore;
use crate::types::{ChannelPair, Relayer, SegmentTransfer};

/// A relayer address seen receiving packets on the destination end of a path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelayerObservation {
    pub address: String,
    pub dc_chain_id: String,
    pub dc_channel: String,
    pub sc_chain_id: String,
    pub sc_channel: String,
}

impl RelayerObservation {
    pub fn from_transfer(transfer: &SegmentTransfer) -> Self {
        Self {
            address: transfer.address.clone(),
            dc_chain_id: transfer.dc_chain_id.clone(),
            dc_channel: transfer.dc_channel.clone(),
            sc_chain_id: transfer.sc_chain_id.clone(),
            sc_channel: transfer.sc_channel.clone(),
        }
    }

    /// Distinct observations in a scan, skipping transfers without a signer
    pub fn distinct(transfers: &[SegmentTransfer]) -> BTreeSet<Self> {
        transfers
            .iter()
            .filter(|t| !t.address.is_empty())
            .map(Self::from_transfer)
            .collect()
    }

    fn pair(&self) -> ChannelPair {
        ChannelPair {
            chain_a: self.sc_chain_id.clone(),
            channel_a: self.sc_channel.clone(),
            address_a: String::new(),
            chain_b: self.dc_chain_id.clone(),
            channel_b: self.dc_channel.clone(),
            address_b: self.address.clone(),
        }
    }

    fn connects(&self, pair: &ChannelPair) -> bool {
        pair.connects(&self.sc_chain_id, &self.sc_channel, &self.dc_chain_id, &self.dc_channel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Known,
    Backfilled,
    Appended,
    Created,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    pub known: usize,
    pub backfilled: usize,
    pub appended: usize,
    pub created: usize,
    pub failures: usize,
}

impl RegistrationReport {
    fn add(&mut self, outcome: RegistrationOutcome) {
        match outcome {
            RegistrationOutcome::Known => self.known += 1,
            RegistrationOutcome::Backfilled => self.backfilled += 1,
            RegistrationOutcome::Appended => self.appended += 1,
            RegistrationOutcome::Created => self.created += 1,
        }
    }
}

pub struct RelayerRegistrar {
    relayers: Arc<dyn RelayerStore>,
    metrics: Arc<EngineMetrics>,
}

impl RelayerRegistrar {
    pub fn new(relayers: Arc<dyn RelayerStore>, metrics: Arc<EngineMetrics>) -> Self {
        Self { relayers, metrics }
    }

    /// Register every observation in turn. Observations are applied one at a
    /// time so two of them never race on the same relayer.
    pub async fn register_all(&self, observations: BTreeSet<RelayerObservation>, now: i64) -> RegistrationReport {
        let mut report = RegistrationReport::default();
        for observation in observations {
            match self.register(&observation, now).await {
                Ok(outcome) => {
                    if matches!(
                        outcome,
                        RegistrationOutcome::Created | RegistrationOutcome::Backfilled | RegistrationOutcome::Appended
                    ) {
                        self.metrics.relayers_registered.inc();
                    }
                    report.add(outcome);
                }
                Err(e) => {
                    warn!(
                        address = %observation.address,
                        chain = %observation.dc_chain_id,
                        channel = %observation.dc_channel,
                        "Failed to register relayer: {}",
                        e
                    );
                    self.metrics.unit_failures.inc();
                    report.failures += 1;
                }
            }
        }

        if report.created + report.backfilled + report.appended > 0 {
            info!(
                created = report.created,
                backfilled = report.backfilled,
                appended = report.appended,
                "Relayer registry updated"
            );
        }
        report
    }

    pub async fn register(&self, observation: &RelayerObservation, now: i64) -> Result<RegistrationOutcome, StoreError> {
        let chain = &observation.dc_chain_id;
        let channel = &observation.dc_channel;
        let owners = self.relayers.find_by_address(chain, &observation.address).await?;

        let already_listed = owners.iter().any(|r| {
            r.channel_pairs
                .iter()
                .any(|p| observation.connects(p) && p.address_on(chain, channel) == Some(observation.address.as_str()))
        });
        if already_listed {
            return Ok(RegistrationOutcome::Known);
        }

        let on_channel = self
            .relayers
            .find_by_channel(
                &observation.sc_chain_id,
                &observation.sc_channel,
                chain,
                channel,
            )
            .await?;
        for relayer in on_channel {
            let mut pairs = relayer.channel_pairs.clone();
            let filled = pairs
                .iter_mut()
                .any(|p| observation.connects(p) && p.backfill_address(chain, channel, &observation.address));
            if filled {
                debug!(relayer_id = %relayer.relayer_id, address = %observation.address, "Back-filling address");
                self.relayers.update_channel_pairs(&relayer.relayer_id, pairs).await?;
                return Ok(RegistrationOutcome::Backfilled);
            }
        }

        if let Some(owner) = owners.into_iter().next() {
            if owner.channel_pairs.iter().any(|p| observation.connects(p)) {
                return Ok(RegistrationOutcome::Known);
            }
            let mut pairs = owner.channel_pairs;
            pairs.push(observation.pair());
            debug!(relayer_id = %owner.relayer_id, address = %observation.address, "Appending channel pair");
            self.relayers.update_channel_pairs(&owner.relayer_id, pairs).await?;
            return Ok(RegistrationOutcome::Appended);
        }

        let relayer = Relayer {
            relayer_id: uuid::Uuid::new_v4().to_string(),
            relayer_name: String::new(),
            channel_pairs: vec![observation.pair()],
            update_time: 0,
            totals: Default::default(),
            create_at: now,
            update_at: now,
        };
        debug!(relayer_id = %relayer.relayer_id, address = %observation.address, "Creating relayer");
        self.relayers.insert(relayer).await?;
        Ok(RegistrationOutcome::Created)
    }
}

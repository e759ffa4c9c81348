//! Swap persistence.
//!
//! [`SwapStore`] is what the orchestrator needs from a database.
//! [`JsonSwapStore`] keeps everything in memory and snapshots it to a JSON
//! file after every mutation.

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::chain::types::Currency;
use crate::swap::types::{ChainSwap, ReverseSwap, SubmarineSwap, SwapMnemonic, SwapState};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("swap {0} already exists")]
    Duplicate(String),

    #[error("swap {0} not found")]
    NotFound(String),

    #[error("store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg_attr(test, mockall::automock)]
pub trait SwapStore: Send + Sync {
    fn swap_mnemonic(&self) -> StoreResult<Option<SwapMnemonic>>;

    fn set_swap_mnemonic(&self, mnemonic: SwapMnemonic) -> StoreResult<()>;

    /// Persist `last_key_index + 1`.
    fn increment_swap_mnemonic_index(&self) -> StoreResult<()>;

    fn create_swap(&self, swap: SubmarineSwap) -> StoreResult<()>;

    fn update_swap(&self, swap: SubmarineSwap) -> StoreResult<()>;

    fn query_swap(&self, id: &str) -> StoreResult<Option<SubmarineSwap>>;

    fn query_swap_by_invoice(&self, invoice: &str) -> StoreResult<Option<SubmarineSwap>>;

    fn create_reverse_swap(&self, swap: ReverseSwap) -> StoreResult<()>;

    fn update_reverse_swap(&self, swap: ReverseSwap) -> StoreResult<()>;

    fn query_reverse_swap(&self, id: &str) -> StoreResult<Option<ReverseSwap>>;

    fn create_chain_swap(&self, swap: ChainSwap) -> StoreResult<()>;

    fn update_chain_swap(&self, swap: ChainSwap) -> StoreResult<()>;

    fn query_chain_swap(&self, id: &str) -> StoreResult<Option<ChainSwap>>;

    fn query_pending_swaps(&self) -> StoreResult<Vec<SubmarineSwap>>;

    fn query_pending_reverse_swaps(&self) -> StoreResult<Vec<ReverseSwap>>;

    fn query_pending_chain_swaps(&self) -> StoreResult<Vec<ChainSwap>>;

    /// Submarine swaps locked on `currency` that have to be refunded at `height`.
    fn query_refundable_swaps(&self, currency: Currency, height: u32) -> StoreResult<Vec<SubmarineSwap>>;

    fn query_refundable_chain_swaps(&self, currency: Currency, height: u32) -> StoreResult<Vec<ChainSwap>>;

    fn query_claimable_reverse_swaps(&self, currency: Currency) -> StoreResult<Vec<ReverseSwap>>;

    fn query_claimable_chain_swaps(&self, currency: Currency) -> StoreResult<Vec<ChainSwap>>;
}

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    mnemonic: Option<SwapMnemonic>,
    swaps: Vec<SubmarineSwap>,
    reverse_swaps: Vec<ReverseSwap>,
    chain_swaps: Vec<ChainSwap>,
}

/// Serialize `snapshot` into `file` and sync it to disk. Buffered write
/// errors surface here instead of being dropped with the writer.
fn write_snapshot(file: File, snapshot: &Snapshot) -> StoreResult<()> {
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, snapshot)?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(())
}

/// In-memory store mirrored to a JSON file.
#[derive(Clone, Default)]
pub struct JsonSwapStore {
    mnemonic: Arc<ArcSwapOption<SwapMnemonic>>,
    swaps: Arc<DashMap<String, SubmarineSwap>>,
    reverse_swaps: Arc<DashMap<String, ReverseSwap>>,
    chain_swaps: Arc<DashMap<String, ChainSwap>>,
    persistence_path: Option<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl JsonSwapStore {
    /// Store without a backing file.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the store at `path`, loading it when the file exists.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let store = Self {
            persistence_path: Some(path.to_path_buf()),
            ..Self::default()
        };
        if path.exists() {
            let snapshot: Snapshot = serde_json::from_reader(BufReader::new(File::open(path)?))?;
            store.mnemonic.store(snapshot.mnemonic.map(Arc::new));
            for swap in snapshot.swaps {
                store.swaps.insert(swap.id.clone(), swap);
            }
            for swap in snapshot.reverse_swaps {
                store.reverse_swaps.insert(swap.id.clone(), swap);
            }
            for swap in snapshot.chain_swaps {
                store.chain_swaps.insert(swap.id.clone(), swap);
            }
            tracing::info!(
                path = %path.display(),
                swaps = store.swaps.len(),
                reverse_swaps = store.reverse_swaps.len(),
                chain_swaps = store.chain_swaps.len(),
                "Loaded swap store"
            );
        }
        Ok(store)
    }

    fn save(&self) -> StoreResult<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let snapshot = Snapshot {
            mnemonic: self.mnemonic.load_full().map(|m| (*m).clone()),
            swaps: self.swaps.iter().map(|r| r.value().clone()).collect(),
            reverse_swaps: self.reverse_swaps.iter().map(|r| r.value().clone()).collect(),
            chain_swaps: self.chain_swaps.iter().map(|r| r.value().clone()).collect(),
        };

        // write-then-rename so a crash never leaves a truncated file
        let tmp = path.with_extension("json.tmp");
        write_snapshot(File::create(&tmp)?, &snapshot)?;
        std::fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), "Saved swap store");
        Ok(())
    }

    fn insert_new<T: Clone>(map: &DashMap<String, T>, id: &str, value: T) -> StoreResult<()> {
        match map.entry(id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Duplicate(id.to_string())),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
        }
    }

    fn replace<T: Clone>(map: &DashMap<String, T>, id: &str, value: T) -> StoreResult<()> {
        match map.get_mut(id) {
            Some(mut entry) => {
                *entry = value;
                Ok(())
            }
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    fn filter<T: Clone>(map: &DashMap<String, T>, keep: impl Fn(&T) -> bool) -> Vec<T> {
        map.iter()
            .filter(|r| keep(r.value()))
            .map(|r| r.value().clone())
            .collect()
    }
}

impl SwapStore for JsonSwapStore {
    fn swap_mnemonic(&self) -> StoreResult<Option<SwapMnemonic>> {
        Ok(self.mnemonic.load_full().map(|m| (*m).clone()))
    }

    fn set_swap_mnemonic(&self, mnemonic: SwapMnemonic) -> StoreResult<()> {
        self.mnemonic.store(Some(Arc::new(mnemonic)));
        self.save()
    }

    fn increment_swap_mnemonic_index(&self) -> StoreResult<()> {
        self.mnemonic.rcu(|current| {
            current.as_ref().map(|m| {
                Arc::new(SwapMnemonic {
                    mnemonic: m.mnemonic.clone(),
                    last_key_index: m.last_key_index + 1,
                })
            })
        });
        self.save()
    }

    fn create_swap(&self, swap: SubmarineSwap) -> StoreResult<()> {
        Self::insert_new(&self.swaps, &swap.id.clone(), swap)?;
        self.save()
    }

    fn update_swap(&self, swap: SubmarineSwap) -> StoreResult<()> {
        Self::replace(&self.swaps, &swap.id.clone(), swap)?;
        self.save()
    }

    fn query_swap(&self, id: &str) -> StoreResult<Option<SubmarineSwap>> {
        Ok(self.swaps.get(id).map(|r| r.value().clone()))
    }

    fn query_swap_by_invoice(&self, invoice: &str) -> StoreResult<Option<SubmarineSwap>> {
        Ok(self
            .swaps
            .iter()
            .find(|r| r.value().invoice == invoice)
            .map(|r| r.value().clone()))
    }

    fn create_reverse_swap(&self, swap: ReverseSwap) -> StoreResult<()> {
        Self::insert_new(&self.reverse_swaps, &swap.id.clone(), swap)?;
        self.save()
    }

    fn update_reverse_swap(&self, swap: ReverseSwap) -> StoreResult<()> {
        Self::replace(&self.reverse_swaps, &swap.id.clone(), swap)?;
        self.save()
    }

    fn query_reverse_swap(&self, id: &str) -> StoreResult<Option<ReverseSwap>> {
        Ok(self.reverse_swaps.get(id).map(|r| r.value().clone()))
    }

    fn create_chain_swap(&self, swap: ChainSwap) -> StoreResult<()> {
        Self::insert_new(&self.chain_swaps, &swap.id.clone(), swap)?;
        self.save()
    }

    fn update_chain_swap(&self, swap: ChainSwap) -> StoreResult<()> {
        Self::replace(&self.chain_swaps, &swap.id.clone(), swap)?;
        self.save()
    }

    fn query_chain_swap(&self, id: &str) -> StoreResult<Option<ChainSwap>> {
        Ok(self.chain_swaps.get(id).map(|r| r.value().clone()))
    }

    fn query_pending_swaps(&self) -> StoreResult<Vec<SubmarineSwap>> {
        Ok(Self::filter(&self.swaps, |s| s.state == SwapState::Pending))
    }

    fn query_pending_reverse_swaps(&self) -> StoreResult<Vec<ReverseSwap>> {
        Ok(Self::filter(&self.reverse_swaps, |s| s.state == SwapState::Pending))
    }

    fn query_pending_chain_swaps(&self) -> StoreResult<Vec<ChainSwap>> {
        Ok(Self::filter(&self.chain_swaps, |s| s.state == SwapState::Pending))
    }

    fn query_refundable_swaps(&self, currency: Currency, height: u32) -> StoreResult<Vec<SubmarineSwap>> {
        Ok(Self::filter(&self.swaps, |s| {
            s.pair.from == currency && s.is_refundable(height)
        }))
    }

    fn query_refundable_chain_swaps(&self, currency: Currency, height: u32) -> StoreResult<Vec<ChainSwap>> {
        Ok(Self::filter(&self.chain_swaps, |s| {
            s.from_data.currency == currency && s.is_refundable(height)
        }))
    }

    fn query_claimable_reverse_swaps(&self, currency: Currency) -> StoreResult<Vec<ReverseSwap>> {
        Ok(Self::filter(&self.reverse_swaps, |s| {
            s.pair.to == currency && s.is_claimable()
        }))
    }

    fn query_claimable_chain_swaps(&self, currency: Currency) -> StoreResult<Vec<ChainSwap>> {
        Ok(Self::filter(&self.chain_swaps, |s| {
            s.to_data.currency == currency && s.is_claimable()
        }))
    }
}

//! The emulated accelerator device.
//!
//! The device owns two finite resources: resident Huffman table slots and work queue
//! entries. Both are handed out as RAII guards so that a table or submission that is
//! dropped without explicit cleanup still returns its resource.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use hashbrown::HashMap;

use crate::config::AcceleratorConfig;
use crate::error::JobError;
use crate::table::{TableKind, TableRepresentation};
use crate::types::ExecutionPath;

/// What a resident table slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    pub kind: TableKind,
    pub representation: TableRepresentation,
}

#[derive(Debug)]
pub struct Accelerator {
    config: AcceleratorConfig,
    in_flight: AtomicUsize,
    next_slot_id: AtomicU64,
    slots: Mutex<HashMap<u64, SlotInfo>>,
}

impl Accelerator {
    pub fn new(config: AcceleratorConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            in_flight: AtomicUsize::new(0),
            next_slot_id: AtomicU64::new(1),
            slots: Mutex::new(HashMap::new()),
        })
    }

    /// The process-wide device. The first caller's configuration wins.
    pub fn shared(config: &AcceleratorConfig) -> Arc<Self> {
        static SHARED: OnceLock<Arc<Accelerator>> = OnceLock::new();
        SHARED
            .get_or_init(|| {
                log::info!(
                    "initializing accelerator: {} table slots, queue depth {}",
                    config.table_slots,
                    config.queue_depth
                );
                Accelerator::new(config.clone())
            })
            .clone()
    }

    pub fn config(&self) -> &AcceleratorConfig {
        &self.config
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<u64, SlotInfo>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserves a resident table slot.
    pub fn reserve_table(
        self: &Arc<Self>,
        kind: TableKind,
        representation: TableRepresentation,
    ) -> Result<TableSlot, JobError> {
        let mut slots = self.slots();
        if slots.len() >= self.config.table_slots {
            log::warn!(
                "accelerator table slots exhausted ({} of {} in use)",
                slots.len(),
                self.config.table_slots
            );
            return Err(JobError::Allocation {
                what: "a Huffman table slot",
                path: ExecutionPath::Hardware,
            });
        }
        let id = self.next_slot_id.fetch_add(1, Ordering::Relaxed);
        slots.insert(id, SlotInfo { kind, representation });
        log::debug!("reserved accelerator table slot {} for a {:?} table", id, kind);
        Ok(TableSlot {
            accelerator: Arc::clone(self),
            id,
        })
    }

    fn release_table(&self, id: u64) {
        if self.slots().remove(&id).is_some() {
            log::debug!("released accelerator table slot {}", id);
        }
    }

    pub fn resident_tables(&self) -> usize {
        self.slots().len()
    }

    /// Claims a work queue entry, failing fast when the queue is full.
    pub fn enqueue(self: &Arc<Self>) -> Result<QueueEntry, JobError> {
        let depth = self.config.queue_depth;
        let mut current = self.in_flight.load(Ordering::Acquire);
        loop {
            if current >= depth {
                return Err(JobError::WorkQueueBusy { depth });
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Ok(QueueEntry {
                        accelerator: Arc::clone(self),
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// A reserved table slot; released on drop.
#[derive(Debug)]
pub struct TableSlot {
    accelerator: Arc<Accelerator>,
    id: u64,
}

impl TableSlot {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for TableSlot {
    fn drop(&mut self) {
        self.accelerator.release_table(self.id);
    }
}

/// A claimed work queue entry; released on drop.
#[derive(Debug)]
pub struct QueueEntry {
    accelerator: Arc<Accelerator>,
}

impl Drop for QueueEntry {
    fn drop(&mut self) {
        self.accelerator.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_device(table_slots: usize, queue_depth: usize) -> Arc<Accelerator> {
        Accelerator::new(AcceleratorConfig {
            table_slots,
            queue_depth,
        })
    }

    #[test]
    fn test_table_slots_are_finite_and_recycled() {
        let device = small_device(2, 4);
        let a = device
            .reserve_table(TableKind::Combined, TableRepresentation::Deflate)
            .unwrap();
        let _b = device
            .reserve_table(TableKind::Compression, TableRepresentation::HuffmanOnly)
            .unwrap();
        let err = device
            .reserve_table(TableKind::Decompression, TableRepresentation::Deflate)
            .unwrap_err();
        assert!(matches!(err, JobError::Allocation { .. }));

        drop(a);
        assert_eq!(device.resident_tables(), 1);
        assert!(device
            .reserve_table(TableKind::Decompression, TableRepresentation::Deflate)
            .is_ok());
    }

    #[test]
    fn test_queue_rejects_when_full() {
        let device = small_device(1, 1);
        let entry = device.enqueue().unwrap();
        assert_eq!(device.in_flight(), 1);
        assert!(matches!(
            device.enqueue(),
            Err(JobError::WorkQueueBusy { depth: 1 })
        ));
        drop(entry);
        assert_eq!(device.in_flight(), 0);
        assert!(device.enqueue().is_ok());
    }
}

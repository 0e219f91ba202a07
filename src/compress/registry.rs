//! Lock and lifecycle management for compression back-ends.
//!
//! All mutable model-table state (loaded back-ends, reference counts, the
//! load-failure timestamp) lives behind a single reader/writer lock. The
//! ensure-init protocol called on every send and every receive takes the
//! read lock on the fast path and upgrades to the write lock only to load or
//! initialize a back-end. The returned [`OpsGuard`] keeps whichever lock was
//! held so a concurrent teardown cannot unload a back-end mid-transform; it
//! releases on drop.
//!
//! Because decompression loads libraries on demand based on a byte chosen by
//! the remote peer, a crafted stream of packets could otherwise force
//! expensive load attempts in a tight loop. After any load failure, further
//! decompress-path load attempts are refused for a backoff window; the send
//! path is never throttled since the model there was picked by the local
//! operator.

use std::sync::{Arc, LazyLock, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::compress::backend::{Charge, CompressBackend};
use crate::compress::model::{Model, ModelDescriptor, MODEL_TABLE};
use crate::error::{LinkmeshError, Result};

/// Cap on registered compression methods. Wire ids are a single byte and 255
/// is the reserved sentinel.
pub const MAX_COMPRESS_METHODS: usize = 255;

/// Window during which decompress-path load retries are refused after a
/// failed load attempt.
pub(crate) const LOAD_FAILURE_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Default)]
pub(crate) struct Slot {
    /// Loaded back-end; `None` until first use and again after unload.
    pub(crate) backend: Option<Box<dyn CompressBackend>>,
    /// Count of handles currently holding a charge against this back-end.
    pub(crate) libref: u32,
}

pub(crate) struct RegistryState {
    pub(crate) slots: Vec<Slot>,
    /// Monotonic time of the most recent load failure, any model.
    pub(crate) last_load_failure: Option<Instant>,
}

/// Process-wide registry of compression back-ends.
///
/// One shared instance serves every transport handle in the process (shared
/// libraries are process-wide state); isolated instances can be created for
/// tests or embedding via [`CompressRegistry::with_table`].
pub struct CompressRegistry {
    table: &'static [ModelDescriptor],
    max_model: u8,
    state: RwLock<RegistryState>,
}

impl std::fmt::Debug for CompressRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressRegistry")
            .field("max_model", &self.max_model)
            .finish()
    }
}

static SHARED: LazyLock<Arc<CompressRegistry>> =
    LazyLock::new(|| Arc::new(CompressRegistry::new()));

/// The process-wide registry instance.
pub fn shared() -> Arc<CompressRegistry> {
    Arc::clone(&SHARED)
}

/// Scoped guard over the registry lock, returned by ensure-init.
///
/// Encodes which lock mode the protocol ended up holding: read on the
/// already-loaded fast path, write when a load or init ran. Callers perform
/// the transform through [`OpsGuard::backend`] and drop the guard afterward.
pub(crate) enum OpsGuard<'a> {
    Read(RwLockReadGuard<'a, RegistryState>),
    Write(RwLockWriteGuard<'a, RegistryState>),
}

impl OpsGuard<'_> {
    pub(crate) fn backend(&self, model_id: u8) -> &dyn CompressBackend {
        let state: &RegistryState = match self {
            OpsGuard::Read(guard) => guard,
            OpsGuard::Write(guard) => guard,
        };
        match state.slots[model_id as usize].backend.as_deref() {
            Some(backend) => backend,
            None => unreachable!("ensure_init returned without a loaded back-end"),
        }
    }
}

/// Result of the ensure-init protocol.
pub(crate) struct EnsureOutcome<'a> {
    pub(crate) guard: OpsGuard<'a>,
    /// Whether this call charged a new reference for the handle. A caller
    /// that fails validation after ensure-init uses this to roll the charge
    /// back.
    pub(crate) newly_charged: bool,
}

impl std::fmt::Debug for EnsureOutcome<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnsureOutcome")
            .field("newly_charged", &self.newly_charged)
            .finish()
    }
}

impl Default for CompressRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressRegistry {
    /// Create a registry over the static model table.
    pub fn new() -> Self {
        // The static table length is checked at compile time, so this
        // cannot hit the runtime cap.
        let max_model = table_max_model(&MODEL_TABLE);
        Self {
            table: &MODEL_TABLE,
            max_model,
            state: RwLock::new(RegistryState {
                slots: new_slots(max_model),
                last_load_failure: None,
            }),
        }
    }

    /// Create a registry over a caller-supplied table.
    ///
    /// Rejects tables larger than [`MAX_COMPRESS_METHODS`].
    pub(crate) fn with_table(table: &'static [ModelDescriptor]) -> Result<Self> {
        if table.len() > MAX_COMPRESS_METHODS {
            tracing::error!(
                "too many compress methods defined ({} > {MAX_COMPRESS_METHODS})",
                table.len()
            );
            return Err(LinkmeshError::InvalidArgument(
                "too many compress methods defined".into(),
            ));
        }
        let max_model = table_max_model(table);
        Ok(Self {
            table,
            max_model,
            state: RwLock::new(RegistryState {
                slots: new_slots(max_model),
                last_load_failure: None,
            }),
        })
    }

    /// Highest valid wire id in this registry's table.
    pub fn max_model(&self) -> u8 {
        self.max_model
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.max_model as usize + 1
    }

    pub(crate) fn descriptor_by_id(&self, id: u8) -> Option<&'static ModelDescriptor> {
        self.table.iter().find(|row| row.id == id)
    }

    pub(crate) fn descriptor_by_name(&self, name: &str) -> Option<&'static ModelDescriptor> {
        self.table.iter().find(|row| row.name == name)
    }

    /// Current reference count for a model's back-end.
    pub fn libref(&self, model: Model) -> u32 {
        self.libref_of(model.id())
    }

    /// Whether a model's back-end is currently loaded.
    pub fn is_loaded(&self, model: Model) -> bool {
        self.loaded_of(model.id())
    }

    pub(crate) fn libref_of(&self, id: u8) -> u32 {
        self.state
            .read()
            .map(|state| {
                state
                    .slots
                    .get(id as usize)
                    .map(|slot| slot.libref)
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    pub(crate) fn loaded_of(&self, id: u8) -> bool {
        self.state
            .read()
            .map(|state| {
                state
                    .slots
                    .get(id as usize)
                    .map(|slot| slot.backend.is_some())
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// Ensure a back-end is loaded and initialized for the calling handle,
    /// returning with the registry lock held for the subsequent transform.
    pub(crate) fn ensure_init(
        &self,
        charges: &Mutex<Vec<Charge>>,
        model_id: u8,
        rate_limit: bool,
    ) -> Result<EnsureOutcome<'_>> {
        self.ensure_init_at(charges, model_id, rate_limit, Instant::now())
    }

    /// Ensure-init with an explicit current instant, so the backoff window
    /// can be exercised without waiting out real time.
    pub(crate) fn ensure_init_at(
        &self,
        charges: &Mutex<Vec<Charge>>,
        model_id: u8,
        rate_limit: bool,
        now: Instant,
    ) -> Result<EnsureOutcome<'_>> {
        let row = self.descriptor_by_id(model_id).ok_or_else(|| {
            LinkmeshError::InvalidArgument(format!("unknown compress model {model_id}"))
        })?;
        let idx = model_id as usize;

        let state = self.state.read().map_err(|_| LinkmeshError::Lock)?;

        // Fast path: back-end loaded and this handle already charged. Keep
        // the read lock so a concurrent teardown cannot unload underneath
        // the transform.
        if state.slots[idx].backend.is_some() && is_charged(charges, idx)? {
            return Ok(EnsureOutcome {
                guard: OpsGuard::Read(state),
                newly_charged: false,
            });
        }

        if rate_limit {
            if let Some(failed_at) = state.last_load_failure {
                if now.saturating_duration_since(failed_at) < LOAD_FAILURE_BACKOFF {
                    return Err(LinkmeshError::RateLimited);
                }
            }
        }

        drop(state);
        let mut state = self.state.write().map_err(|_| LinkmeshError::Lock)?;

        // Another thread of the same handle may have completed the charge
        // between the two locks; the handle must charge exactly once.
        if state.slots[idx].backend.is_some() && is_charged(charges, idx)? {
            return Ok(EnsureOutcome {
                guard: OpsGuard::Write(state),
                newly_charged: false,
            });
        }

        if state.slots[idx].backend.is_none() {
            let loader = row.loader.ok_or_else(|| {
                LinkmeshError::InvalidArgument(format!(
                    "compress model {} not built in",
                    row.name
                ))
            })?;
            match loader() {
                Ok(backend) => state.slots[idx].backend = Some(backend),
                Err(source) => {
                    state.last_load_failure = Some(now);
                    return Err(LinkmeshError::LoadFailure {
                        model: row.name,
                        reason: source.to_string(),
                    });
                }
            }
        }

        let charge = match state.slots[idx].backend.as_deref() {
            Some(backend) => match backend.init_handle() {
                Ok(Some(handle_state)) => Charge::State(handle_state),
                Ok(None) => Charge::Marked,
                Err(source) => {
                    return Err(LinkmeshError::InitFailure {
                        model: row.name,
                        reason: source.to_string(),
                    });
                }
            },
            None => unreachable!("back-end loaded above"),
        };

        {
            let mut charged = charges.lock().map_err(|_| LinkmeshError::Lock)?;
            charged[idx] = charge;
        }
        state.slots[idx].libref += 1;

        Ok(EnsureOutcome {
            guard: OpsGuard::Write(state),
            newly_charged: true,
        })
    }

    /// Undo a charge taken by a just-completed ensure-init, for callers whose
    /// own validation failed afterward. A no-op unless the outcome actually
    /// charged.
    pub(crate) fn rollback_charge(
        &self,
        outcome: EnsureOutcome<'_>,
        charges: &Mutex<Vec<Charge>>,
        model_id: u8,
    ) {
        if !outcome.newly_charged {
            return;
        }
        let idx = model_id as usize;
        if let OpsGuard::Write(mut state) = outcome.guard {
            if let Ok(mut charged) = charges.lock() {
                charged[idx] = Charge::None;
            }
            let slot = &mut state.slots[idx];
            slot.libref = slot.libref.saturating_sub(1);
        }
    }

    /// Release every charge a handle made, unloading back-ends whose
    /// reference count returns to zero. Best-effort: a poisoned lock is
    /// logged and the references leak for the rest of the process.
    pub(crate) fn release_charges(&self, charges: &Mutex<Vec<Charge>>) {
        let Ok(mut state) = self.state.write() else {
            tracing::error!("unable to take write lock for compress teardown");
            return;
        };
        let Ok(mut charged) = charges.lock() else {
            tracing::error!("per-handle compress state poisoned during teardown");
            return;
        };

        let bound = charged.len().min(MAX_COMPRESS_METHODS);
        for idx in 0..bound {
            if !charged[idx].is_charged() {
                continue;
            }
            // Dropping the charge releases any back-end handle state.
            charged[idx] = Charge::None;
            let slot = &mut state.slots[idx];
            slot.libref = slot.libref.saturating_sub(1);
            if slot.libref == 0 && slot.backend.is_some() {
                if let Some(row) = self.descriptor_by_id(idx as u8) {
                    tracing::debug!("unloading {} library", row.name);
                }
                slot.backend = None;
            }
        }
    }
}

fn is_charged(charges: &Mutex<Vec<Charge>>, idx: usize) -> Result<bool> {
    Ok(charges.lock().map_err(|_| LinkmeshError::Lock)?[idx].is_charged())
}

fn table_max_model(table: &[ModelDescriptor]) -> u8 {
    table.iter().map(|row| row.id).max().unwrap_or(0)
}

fn new_slots(max_model: u8) -> Vec<Slot> {
    let mut slots = Vec::with_capacity(max_model as usize + 1);
    slots.resize_with(max_model as usize + 1, Slot::default);
    slots
}

//! Compiled-kernel cache.
//!
//! Turning a [`KernelSpec`](crate::kernel::KernelSpec) into a callable is a
//! one-time, amortizable cost per `(component, rank, role, mode)`
//! combination; callers cache compiled kernels by that key rather than
//! recompiling per call. The cache is `RwLock`-protected so concurrent
//! simulation workers can share it without further locking.

use crate::errors::KernelResult;
use crate::kernel::{BindingMode, Kernel, KernelRole};
use crate::rank::Rank;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Identity of one compiled kernel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub component: String,
    pub rank: Rank,
    pub role: KernelRole,
    pub mode: BindingMode,
}

impl KernelKey {
    pub fn new(component: &str, rank: Rank, role: KernelRole, mode: BindingMode) -> Self {
        Self {
            component: component.to_string(),
            rank,
            role,
            mode,
        }
    }
}

/// Cache of compiled kernels, shared between workers.
pub struct KernelCache {
    kernels: RwLock<HashMap<KernelKey, Arc<Kernel>>>,
}

impl KernelCache {
    pub fn new() -> Self {
        Self {
            kernels: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &KernelKey) -> Option<Arc<Kernel>> {
        let kernels = self.kernels.read().expect("Cache lock poisoned");
        kernels.get(key).cloned()
    }

    /// Return the cached kernel for `key`, compiling it on a miss.
    pub fn get_or_compile(
        &self,
        key: KernelKey,
        compile: impl FnOnce() -> KernelResult<Kernel>,
    ) -> KernelResult<Arc<Kernel>> {
        if let Some(kernel) = self.get(&key) {
            return Ok(kernel);
        }

        let kernel = Arc::new(compile()?);
        log::debug!(
            "cached {} kernel for '{}' at {} rank ({:?} mode)",
            key.role,
            key.component,
            key.rank,
            key.mode
        );
        let mut kernels = self.kernels.write().expect("Cache lock poisoned");
        // A racing worker may have compiled the same key; keep the first.
        let entry = kernels.entry(key).or_insert_with(|| Arc::clone(&kernel));
        Ok(Arc::clone(entry))
    }

    pub fn len(&self) -> usize {
        let kernels = self.kernels.read().expect("Cache lock poisoned");
        kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all cached kernels. Primarily useful for testing.
    pub fn clear(&self) {
        let mut kernels = self.kernels.write().expect("Cache lock poisoned");
        kernels.clear();
    }
}

impl Default for KernelCache {
    fn default() -> Self {
        Self::new()
    }
}

//! The process-wide handle `autoGlobal` may publish a kernel's metadata to.
//!
//! Spec §9 treats the source's global singleton resolver as "a convenience
//! only". A live [`crate::kernel::built::Kernel`] is single-owner (it holds
//! `&mut self` lifecycle operations like `destroy`), so what this registry
//! actually shares is a read-only [`KernelMetadata`] snapshot taken at
//! `init()` time — enough for a caller elsewhere in the process to check
//! "is a kernel of this shape up", never a handle to mutate or tear it down.
//! Nothing reaches for it unless the built kernel was configured with
//! `with_auto_global(true)`, and access is always through [`global_kernel`],
//! never implicit.

use std::sync::{Arc, OnceLock, RwLock};

use crate::kernel::built::KernelMetadata;

static GLOBAL_KERNEL: OnceLock<RwLock<Option<Arc<KernelMetadata>>>> = OnceLock::new();

fn slot() -> &'static RwLock<Option<Arc<KernelMetadata>>> {
    GLOBAL_KERNEL.get_or_init(|| RwLock::new(None))
}

/// Publishes `metadata` as the process-wide handle. Called once, by
/// `BuiltKernel::init`, only when `auto_global` is set.
pub(crate) fn publish(metadata: KernelMetadata) {
    let mut guard = slot().write().expect("global kernel lock poisoned");
    *guard = Some(Arc::new(metadata));
}

pub(crate) fn clear() {
    let mut guard = slot().write().expect("global kernel lock poisoned");
    *guard = None;
}

/// Returns the metadata of the kernel last published via `auto_global`, if
/// any has been.
pub fn global_kernel() -> Option<Arc<KernelMetadata>> {
    slot().read().expect("global kernel lock poisoned").clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_kernel_is_none_until_published() {
        clear();
        assert!(global_kernel().is_none());
    }
}

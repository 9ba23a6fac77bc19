//! Single-slot memoization of the rendered comment.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::context::{ContextSnapshot, ContextSource};
use crate::error::Result;

#[derive(Debug, Clone)]
enum Cached {
    /// Rendered from the context at `context_version`.
    Rendered {
        comment: Arc<str>,
        context_version: u64,
        generation: u64,
    },
    /// Set explicitly; served regardless of context changes.
    Overridden { comment: Arc<str>, generation: u64 },
}

impl Cached {
    fn comment(&self) -> &Arc<str> {
        match self {
            Cached::Rendered { comment, .. } | Cached::Overridden { comment, .. } => comment,
        }
    }
}

/// Where a comment returned by [`CacheSlot::get_or_render`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// A rendered entry was still valid.
    Hit,
    /// An explicitly set comment was served.
    Override,
    /// The comment was rendered and stored.
    Miss,
}

/// Memoized comment for one unit of work.
///
/// An entry is valid while both the context version and the configuration
/// generation match the values recorded when it was filled. Overrides ignore
/// the context version and last until [`CacheSlot::clear`] or a configuration
/// change.
///
/// The lock is never held while rendering.
#[derive(Debug, Default)]
pub struct CacheSlot {
    state: Mutex<Option<Cached>>,
}

impl CacheSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached comment if still valid, otherwise render and store it.
    ///
    /// A failed render leaves the slot unchanged.
    pub fn get_or_render<F>(
        &self,
        generation: u64,
        context: &dyn ContextSource,
        render: F,
    ) -> Result<(Arc<str>, CacheOutcome)>
    where
        F: FnOnce(&ContextSnapshot) -> Result<String>,
    {
        if let Some(hit) = self.lookup(generation, context.version()) {
            return Ok(hit);
        }

        let snapshot = context.snapshot();
        let comment: Arc<str> = render(&snapshot)?.into();

        *self.lock() = Some(Cached::Rendered {
            comment: Arc::clone(&comment),
            context_version: snapshot.version(),
            generation,
        });

        Ok((comment, CacheOutcome::Miss))
    }

    /// Store `comment` as an override for the given configuration generation.
    pub fn set_comment(&self, generation: u64, comment: impl Into<Arc<str>>) {
        *self.lock() = Some(Cached::Overridden {
            comment: comment.into(),
            generation,
        });
    }

    /// The currently stored comment, valid or not.
    pub fn cached(&self) -> Option<Arc<str>> {
        self.lock().as_ref().map(|cached| Arc::clone(cached.comment()))
    }

    /// The context version recorded with a rendered entry. Overrides have none.
    pub fn cached_version(&self) -> Option<u64> {
        match self.lock().as_ref()? {
            Cached::Rendered {
                context_version, ..
            } => Some(*context_version),
            Cached::Overridden { .. } => None,
        }
    }

    /// Drop the stored entry, rendered or overridden.
    pub fn clear(&self) {
        *self.lock() = None;
    }

    fn lookup(&self, generation: u64, context_version: u64) -> Option<(Arc<str>, CacheOutcome)> {
        let state = self.lock();
        match state.as_ref()? {
            Cached::Rendered {
                comment,
                context_version: stored_version,
                generation: stored_generation,
            } if *stored_generation == generation && *stored_version == context_version => {
                Some((Arc::clone(comment), CacheOutcome::Hit))
            }
            Cached::Overridden {
                comment,
                generation: stored_generation,
            } if *stored_generation == generation => {
                Some((Arc::clone(comment), CacheOutcome::Override))
            }
            _ => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Cached>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

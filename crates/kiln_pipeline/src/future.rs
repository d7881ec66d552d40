//! Artifact futures
//!
//! Every construction the pool starts is wrapped in an [`ArtifactFuture`]: a
//! cloneable handle to a shared future resolving to an
//! [`ArtifactResolution`]. Cloning hands out the same underlying
//! construction, so repeated requests never duplicate background work.
//!
//! A resolution carries `visible_at`, the first visibility marker at which a
//! barrier will have published the result. Waiting on the future, then
//! calling `visibility_barrier_at_least(visible_at)` and reading with the
//! returned marker is the standard "stall until ready" pattern:
//!
//! ```rust,ignore
//! let resolution = pollster::block_on(pool.begin_construction(&accelerator, &config)?);
//! let marker = pool.visibility_barrier_at_least(resolution.visible_at());
//! let reader = pool.lock_for_reading();
//! let pipeline = reader.try_get_pipeline(&accelerator, &config, marker);
//! ```

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use kiln_core::{ConstructionError, DependencyToken, VisibilityMarker};

use crate::backend::Constructed;

/// Pool-unique id of one construction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstructionId(pub(crate) u64);

impl ConstructionId {
    #[inline]
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Final state of one construction attempt.
pub struct ArtifactResolution<A> {
    result: Result<Constructed<Arc<A>>, ConstructionError>,
    visible_at: VisibilityMarker,
}

impl<A> ArtifactResolution<A> {
    pub(crate) fn new(
        result: Result<Constructed<Arc<A>>, ConstructionError>,
        visible_at: VisibilityMarker,
    ) -> Self {
        Self { result, visible_at }
    }

    #[inline]
    #[must_use]
    pub fn result(&self) -> &Result<Constructed<Arc<A>>, ConstructionError> {
        &self.result
    }

    #[must_use]
    pub fn artifact(&self) -> Option<&Arc<A>> {
        self.result.as_ref().ok().map(|c| &c.value)
    }

    #[must_use]
    pub fn error(&self) -> Option<&ConstructionError> {
        self.result.as_ref().err()
    }

    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Token of the artifact, or of the failure when one was attached.
    #[must_use]
    pub fn dependency(&self) -> Option<&DependencyToken> {
        match &self.result {
            Ok(constructed) => Some(&constructed.dependency),
            Err(err) => err.dependency(),
        }
    }

    /// `true` when the inputs this resolution was built from have changed.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.dependency().is_some_and(DependencyToken::is_stale)
    }

    /// First marker at which a barrier will have published this result.
    /// [`VisibilityMarker::NEVER`] when the pool was dropped before the
    /// construction finished.
    #[inline]
    #[must_use]
    pub fn visible_at(&self) -> VisibilityMarker {
        self.visible_at
    }
}

impl<A> fmt::Debug for ArtifactResolution<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactResolution")
            .field("ok", &self.result.is_ok())
            .field("error", &self.error())
            .field("visible_at", &self.visible_at)
            .finish()
    }
}

/// Cloneable handle to one in-flight (or finished) construction.
pub struct ArtifactFuture<A> {
    id: ConstructionId,
    inner: Shared<BoxFuture<'static, Arc<ArtifactResolution<A>>>>,
}

impl<A: Send + Sync + 'static> ArtifactFuture<A> {
    pub(crate) fn new(
        id: ConstructionId,
        future: BoxFuture<'static, Arc<ArtifactResolution<A>>>,
    ) -> Self {
        Self {
            id,
            inner: future.shared(),
        }
    }

    pub(crate) fn ready(id: ConstructionId, resolution: Arc<ArtifactResolution<A>>) -> Self {
        Self::new(id, futures::future::ready(resolution).boxed())
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ConstructionId {
        self.id
    }

    /// The resolution, if the future has already been driven to completion.
    #[must_use]
    pub fn peek(&self) -> Option<&Arc<ArtifactResolution<A>>> {
        self.inner.peek()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.peek().is_some()
    }

    /// `true` when both handles refer to the same construction.
    #[must_use]
    pub fn same_construction(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<A> Clone for ArtifactFuture<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: self.inner.clone(),
        }
    }
}

impl<A: Send + Sync + 'static> Future for ArtifactFuture<A> {
    type Output = Arc<ArtifactResolution<A>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl<A> fmt::Debug for ArtifactFuture<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactFuture").field("id", &self.id).finish_non_exhaustive()
    }
}

pub(crate) type LayoutResult<L> = Result<Constructed<Arc<L>>, ConstructionError>;

/// Shared future of a sequencer config's pipeline layout.
pub type LayoutFuture<L> = Shared<BoxFuture<'static, LayoutResult<L>>>;

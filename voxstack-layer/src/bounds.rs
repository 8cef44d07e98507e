//! Cached observed bounds of a data source.

use voxstack_core::{Result, Signal, SourceHandle, SubscriptionId, ValueRange};

/// Orders sample requests issued by one tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SampleTicket(u64);

/// A bounds query that can run on any thread.
///
/// Obtained from [`BoundsTracker::begin_sample`]; its result is handed back
/// to the tracker with [`BoundsTracker::complete`] on the owner thread.
#[derive(Debug, Clone)]
pub struct SampleRequest {
    /// Ticket identifying the request.
    pub ticket: SampleTicket,
    /// Source generation observed when the request was issued.
    pub generation: u64,
    source: SourceHandle,
}

impl SampleRequest {
    /// Runs the (possibly slow) bounds query.
    ///
    /// # Errors
    /// Propagates the error of [`DataSource::sample_bounds`](voxstack_core::DataSource::sample_bounds).
    pub fn run(&self) -> Result<ValueRange> {
        self.source.sample_bounds()
    }
}

/// Samples a data source and caches its `(min, max)`.
///
/// A new sample is only taken when the cache is stale: never sampled, the
/// source generation moved, or [`mark_dirty`](Self::mark_dirty) was called.
/// Whenever an accepted sample differs from the cached value (exact `f64`
/// comparison, no tolerance) `bounds_changed` fires once.
///
/// Failed samples leave the cache untouched.
#[derive(Debug)]
pub struct BoundsTracker {
    source: SourceHandle,
    cached: Option<ValueRange>,
    sampled_generation: Option<u64>,
    dirty: bool,
    /// Last ticket issued when `mark_dirty` was called.
    dirty_mark: u64,
    issued: u64,
    applied: u64,
    bounds_changed: Signal<ValueRange>,
}

impl BoundsTracker {
    /// Wraps `source` without sampling it.
    #[must_use]
    pub fn new(source: SourceHandle) -> Self {
        Self {
            source,
            cached: None,
            sampled_generation: None,
            dirty: false,
            dirty_mark: 0,
            issued: 0,
            applied: 0,
            bounds_changed: Signal::new(),
        }
    }

    /// The wrapped source.
    #[must_use]
    pub fn source(&self) -> &SourceHandle {
        &self.source
    }

    /// Most recent accepted sample, `None` before the first one.
    #[must_use]
    pub fn cached_bounds(&self) -> Option<ValueRange> {
        self.cached
    }

    /// Subscribes to `boundsChanged`.
    pub fn on_bounds_changed(&self, handler: impl FnMut(&ValueRange) + 'static) -> SubscriptionId {
        self.bounds_changed.subscribe(handler)
    }

    /// Removes a `boundsChanged` subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bounds_changed.unsubscribe(id)
    }

    /// Forces the next sample to query the source.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.dirty_mark = self.issued;
    }

    /// Returns true if a sample would query the source.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.cached.is_none()
            || self.dirty
            || self.sampled_generation != Some(self.source.generation())
    }

    /// Returns the current bounds, sampling the source if the cache is stale.
    ///
    /// # Errors
    /// Returns the source error; the cache keeps its previous value.
    pub fn sample(&mut self) -> Result<ValueRange> {
        self.refresh()?;
        // refresh either filled the cache or found it fresh
        self.cached
            .ok_or_else(|| voxstack_core::Error::SourceUnavailable("no bounds sampled".into()))
    }

    /// Samples if stale; returns the new bounds only if they changed.
    ///
    /// # Errors
    /// Returns the source error; the cache keeps its previous value.
    pub fn refresh(&mut self) -> Result<Option<ValueRange>> {
        if !self.is_stale() {
            log::trace!("reusing cached bounds {:?}", self.cached);
            return Ok(None);
        }
        let request = self.begin_sample();
        let result = request.run();
        self.complete(request.ticket, request.generation, result)
    }

    /// Issues a request to be run elsewhere, typically on a worker thread.
    pub fn begin_sample(&mut self) -> SampleRequest {
        self.issued += 1;
        SampleRequest {
            ticket: SampleTicket(self.issued),
            generation: self.source.generation(),
            source: self.source.clone(),
        }
    }

    /// Applies the result of a request issued by [`begin_sample`](Self::begin_sample).
    ///
    /// Results older than the last applied one are dropped, so the cache
    /// always holds the newest sample regardless of completion order.
    /// Returns the new bounds if the cached value changed.
    ///
    /// # Errors
    /// Returns the sampling error of a non-stale request; the cache keeps
    /// its previous value.
    pub fn complete(
        &mut self,
        ticket: SampleTicket,
        generation: u64,
        result: Result<ValueRange>,
    ) -> Result<Option<ValueRange>> {
        if ticket.0 <= self.applied {
            log::warn!(
                "dropping stale bounds sample {} (latest applied {})",
                ticket.0,
                self.applied
            );
            return Ok(None);
        }
        let bounds = match result {
            Ok(bounds) => bounds,
            Err(e) => {
                log::warn!("bounds sample {} failed: {e}", ticket.0);
                return Err(e);
            }
        };

        self.applied = ticket.0;
        self.sampled_generation = Some(generation);
        if ticket.0 > self.dirty_mark {
            self.dirty = false;
        }
        if self.cached == Some(bounds) {
            return Ok(None);
        }
        log::debug!("bounds changed {:?} -> {bounds}", self.cached);
        self.cached = Some(bounds);
        self.bounds_changed.emit(&bounds);
        Ok(Some(bounds))
    }
}

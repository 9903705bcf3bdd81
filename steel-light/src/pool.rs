//! Free-list pool of propagation engines.
//!
//! Engines own queue buffers sized for a whole chunk, so they are kept around
//! and handed out again instead of being rebuilt for every pass.

use std::{
    ops::{Deref, DerefMut},
    thread,
};

use parking_lot::Mutex;

use crate::{config::WorldBounds, light_engine::LightPropagator};

/// An unbounded cache of idle engines of one kind.
pub struct EnginePool<E> {
    idle: Mutex<Vec<E>>,
    bounds: WorldBounds,
    queue_capacity: usize,
}

impl<E: LightPropagator> EnginePool<E> {
    /// Creates an empty pool. Engines are built on demand.
    #[must_use]
    pub fn new(bounds: WorldBounds, queue_capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            bounds,
            queue_capacity,
        }
    }

    /// Takes an idle engine, or builds a new one if none is idle.
    ///
    /// The engine returns to the pool when the guard drops.
    pub fn acquire(&self) -> PooledEngine<'_, E> {
        let engine = self.idle.lock().pop();
        let engine = engine.unwrap_or_else(|| {
            log::trace!("Building new light engine");
            E::create(self.bounds, self.queue_capacity)
        });
        PooledEngine {
            engine: Some(engine),
            pool: self,
        }
    }

    fn release(&self, engine: E) {
        self.idle.lock().push(engine);
    }

    /// Number of engines waiting to be reused.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }
}

/// Exclusive use of one engine from an [`EnginePool`].
///
/// If the thread unwinds while the guard is alive, the engine's unfinished
/// pass is aborted before the engine goes back to the pool.
pub struct PooledEngine<'pool, E: LightPropagator> {
    engine: Option<E>,
    pool: &'pool EnginePool<E>,
}

impl<E: LightPropagator> Deref for PooledEngine<'_, E> {
    type Target = E;

    fn deref(&self) -> &Self::Target {
        match &self.engine {
            Some(engine) => engine,
            None => unreachable!("engine used after release"),
        }
    }
}

impl<E: LightPropagator> DerefMut for PooledEngine<'_, E> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.engine {
            Some(engine) => engine,
            None => unreachable!("engine used after release"),
        }
    }
}

impl<E: LightPropagator> Drop for PooledEngine<'_, E> {
    fn drop(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            if thread::panicking() {
                log::warn!("Light pass panicked, restoring published light data");
                engine.engine().abort_pass();
            }
            self.pool.release(engine);
        }
    }
}

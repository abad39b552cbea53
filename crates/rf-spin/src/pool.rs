//! Effect pools — reusable throwaway visuals for mutation playback
//!
//! Instances are created lazily through a factory and recycled through a
//! LIFO free list. Each pool belongs to exactly one session; moving it to
//! another session is an explicit [`EffectPool::transfer_ownership`].

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::config::Anchor;

/// Pool errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("Effect handle belongs to a cleared pool")]
    ClearedPool,

    #[error("Effect handle refers to no instance")]
    UnknownSlot,

    #[error("Effect instance was already released")]
    DoubleRelease,

    #[error("No pool registered for effect kind '{0}'")]
    UnknownKind(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════════════════════════════════════════

/// Owner of a set of pools (base game, bonus game, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u32);

impl SessionId {
    pub const BASE: SessionId = SessionId(0);
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POOLED EFFECT
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle callbacks of a pooled object
pub trait PooledEffect {
    fn on_acquire(&mut self) {}
    fn on_release(&mut self) {}
    fn on_transfer(&mut self, _to: SessionId) {}
}

/// The stock effect used by mutation playback
#[derive(Debug, Clone, PartialEq)]
pub struct EffectInstance {
    kind: String,
    serial: u64,
    owner: SessionId,
    active: bool,
    from: Anchor,
    to: Option<Anchor>,
    uses: u32,
}

impl EffectInstance {
    pub fn new(kind: impl Into<String>, serial: u64, owner: SessionId) -> Self {
        Self {
            kind: kind.into(),
            serial,
            owner,
            active: false,
            from: Anchor::default(),
            to: None,
            uses: 0,
        }
    }

    /// Factory closure producing numbered instances of one kind
    pub fn factory(kind: impl Into<String>, owner: SessionId) -> EffectFactory<EffectInstance> {
        let kind = kind.into();
        let mut serial = 0;
        Box::new(move || {
            serial += 1;
            Some(EffectInstance::new(kind.clone(), serial, owner))
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Construction number within its pool
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn owner(&self) -> SessionId {
        self.owner
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Times this instance has been handed out
    pub fn uses(&self) -> u32 {
        self.uses
    }

    pub fn placement(&self) -> (Anchor, Option<Anchor>) {
        (self.from, self.to)
    }

    /// Show at a cell, or fly between two anchors
    pub fn place(&mut self, from: Anchor, to: Option<Anchor>) {
        self.from = from;
        self.to = to;
    }
}

impl PooledEffect for EffectInstance {
    fn on_acquire(&mut self) {
        self.active = true;
        self.uses += 1;
    }

    fn on_release(&mut self) {
        self.active = false;
        self.to = None;
    }

    fn on_transfer(&mut self, to: SessionId) {
        self.owner = to;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POOL
// ═══════════════════════════════════════════════════════════════════════════════

/// Constructor for pool misses; `None` means the visual template is missing
pub type EffectFactory<T> = Box<dyn FnMut() -> Option<T>>;

/// Reference to an acquired instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectHandle {
    epoch: u32,
    slot: u32,
    generation: u32,
}

impl EffectHandle {
    pub fn slot(&self) -> usize {
        self.slot as usize
    }
}

struct PoolSlot<T> {
    value: T,
    generation: u32,
    in_use: bool,
}

/// Lazily grown pool of reusable effects
pub struct EffectPool<T: PooledEffect> {
    slots: Vec<PoolSlot<T>>,
    /// Indices of available instances, most recently released last
    free: Vec<u32>,
    factory: EffectFactory<T>,
    owner: SessionId,
    epoch: u32,
    constructed: usize,
}

impl<T: PooledEffect> EffectPool<T> {
    pub fn new(owner: SessionId, factory: EffectFactory<T>) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            factory,
            owner,
            epoch: 0,
            constructed: 0,
        }
    }

    /// Reuse the most recently released instance, else construct one
    pub fn acquire(&mut self) -> Option<EffectHandle> {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                let value = (self.factory)()?;
                self.slots.push(PoolSlot {
                    value,
                    generation: 0,
                    in_use: false,
                });
                self.constructed += 1;
                (self.slots.len() - 1) as u32
            }
        };

        let entry = &mut self.slots[slot as usize];
        entry.in_use = true;
        entry.value.on_acquire();
        Some(EffectHandle {
            epoch: self.epoch,
            slot,
            generation: entry.generation,
        })
    }

    /// Deactivate an instance and put it back on the free list
    pub fn release(&mut self, handle: EffectHandle) -> Result<(), PoolError> {
        if handle.epoch != self.epoch {
            return Err(PoolError::ClearedPool);
        }
        let entry = self
            .slots
            .get_mut(handle.slot as usize)
            .ok_or(PoolError::UnknownSlot)?;
        if !entry.in_use || entry.generation != handle.generation {
            return Err(PoolError::DoubleRelease);
        }

        entry.in_use = false;
        entry.generation = entry.generation.wrapping_add(1);
        entry.value.on_release();
        self.free.push(handle.slot);
        Ok(())
    }

    fn live_slot(&self, handle: EffectHandle) -> Option<&PoolSlot<T>> {
        if handle.epoch != self.epoch {
            return None;
        }
        self.slots
            .get(handle.slot as usize)
            .filter(|s| s.in_use && s.generation == handle.generation)
    }

    pub fn get(&self, handle: EffectHandle) -> Option<&T> {
        self.live_slot(handle).map(|s| &s.value)
    }

    pub fn get_mut(&mut self, handle: EffectHandle) -> Option<&mut T> {
        self.live_slot(handle)?;
        self.slots.get_mut(handle.slot as usize).map(|s| &mut s.value)
    }

    /// Hand the pool and every instance to another session
    pub fn transfer_ownership(&mut self, to: SessionId) {
        self.owner = to;
        for slot in &mut self.slots {
            slot.value.on_transfer(to);
        }
    }

    /// Drop every instance; outstanding handles become invalid
    pub fn clear(&mut self) -> usize {
        let dropped = self.slots.len();
        self.slots.clear();
        self.free.clear();
        self.epoch = self.epoch.wrapping_add(1);
        dropped
    }

    pub fn owner(&self) -> SessionId {
        self.owner
    }

    pub fn in_use(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Instances built by the factory since creation
    pub fn constructed(&self) -> usize {
        self.constructed
    }

    /// No instance is both free and in use, and every slot is one of the two
    pub fn is_consistent(&self) -> bool {
        let mut seen = vec![false; self.slots.len()];
        for &slot in &self.free {
            match seen.get_mut(slot as usize) {
                Some(flag) if !*flag => *flag = true,
                _ => return false,
            }
        }
        self.slots
            .iter()
            .zip(&seen)
            .all(|(slot, free)| slot.in_use != *free)
    }
}

impl<T: PooledEffect> fmt::Debug for EffectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectPool")
            .field("owner", &self.owner)
            .field("in_use", &self.in_use())
            .field("available", &self.available())
            .field("constructed", &self.constructed)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Acquired effect, tagged with the pool it came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EffectLease {
    kind: String,
    handle: EffectHandle,
}

impl EffectLease {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn handle(&self) -> EffectHandle {
        self.handle
    }
}

/// The pools owned by one session, keyed by effect kind
#[derive(Debug)]
pub struct SessionContext {
    id: SessionId,
    pools: BTreeMap<String, EffectPool<EffectInstance>>,
}

impl SessionContext {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            pools: BTreeMap::new(),
        }
    }

    /// Session with the stock factory registered for each kind
    pub fn with_kinds<I, S>(id: SessionId, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut session = Self::new(id);
        for kind in kinds {
            let kind = kind.into();
            session.register(kind.clone(), EffectInstance::factory(kind, id));
        }
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Register (or replace) the pool for an effect kind
    pub fn register(&mut self, kind: impl Into<String>, factory: EffectFactory<EffectInstance>) {
        let kind = kind.into();
        if let Some(mut old) = self.pools.insert(kind.clone(), EffectPool::new(self.id, factory)) {
            if old.in_use() > 0 {
                log::warn!(
                    "{}: replaced pool '{}' with {} effects still in use",
                    self.id,
                    kind,
                    old.in_use()
                );
            }
            old.clear();
        }
    }

    pub fn pool(&self, kind: &str) -> Option<&EffectPool<EffectInstance>> {
        self.pools.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.pools.keys().map(String::as_str)
    }

    /// Acquire an effect; `None` when the kind is unknown or its factory fails
    pub fn acquire(&mut self, kind: &str) -> Option<EffectLease> {
        let pool = self.pools.get_mut(kind)?;
        let handle = pool.acquire()?;
        Some(EffectLease {
            kind: kind.to_string(),
            handle,
        })
    }

    pub fn release(&mut self, lease: EffectLease) -> Result<(), PoolError> {
        self.pools
            .get_mut(&lease.kind)
            .ok_or_else(|| PoolError::UnknownKind(lease.kind.clone()))?
            .release(lease.handle)
    }

    pub fn get(&self, lease: &EffectLease) -> Option<&EffectInstance> {
        self.pools.get(&lease.kind)?.get(lease.handle)
    }

    pub fn get_mut(&mut self, lease: &EffectLease) -> Option<&mut EffectInstance> {
        self.pools.get_mut(&lease.kind)?.get_mut(lease.handle)
    }

    pub fn in_use(&self) -> usize {
        self.pools.values().map(EffectPool::in_use).sum()
    }

    /// Move every pool to another session
    pub fn transfer_to(&mut self, to: SessionId) {
        log::info!("Effect pools transferred {} -> {}", self.id, to);
        self.id = to;
        for pool in self.pools.values_mut() {
            pool.transfer_ownership(to);
        }
    }

    /// Take over pools from another context; kinds already present are kept
    pub fn absorb(&mut self, mut other: SessionContext) {
        other.transfer_to(self.id);
        for (kind, mut pool) in std::mem::take(&mut other.pools) {
            if self.pools.contains_key(&kind) {
                log::debug!("{}: keeping own '{}' pool, dropping incoming", self.id, kind);
                pool.clear();
            } else {
                self.pools.insert(kind, pool);
            }
        }
    }

    /// Drop every pooled instance, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let leased = self.in_use();
        if leased > 0 {
            log::warn!("{}: clearing pools with {} effects still in use", self.id, leased);
        }
        self.pools.values_mut().map(EffectPool::clear).sum()
    }
}

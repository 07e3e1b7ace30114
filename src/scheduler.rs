//! Single-threaded cooperative event scheduler. Time is a monotone 64-bit
//! cycle counter at the master SH-2's clock; every other component
//! registers a clock ratio and gets woken proportionally. Mirrors the
//! teacher's `Bus::update` per-tick polling idea but keyed by an ordered
//! heap instead of an unconditional per-frame scan, since components here
//! fire at wildly different rates (26 MHz master vs 44.1 kHz audio samples).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

pub type Cycle = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Sh2Master,
    Sh2Slave,
    M68k,
    ScuDsp,
    ScspSample,
    ScuTimer0,
    ScuTimer1,
    VBlankIn,
    VBlankOut,
    HBlankIn,
    EndOfFrame,
}

struct Event {
    time: Cycle,
    seq: u64,
    epoch: u32,
    target: EventTarget,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}
impl Eq for Event {}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the earliest time (and, on a
        // tie, the earliest insertion) pops first.
        other.time.cmp(&self.time).then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A fixed-point clock-ratio: `numerator / denominator` cycles of this
/// component per one master cycle.
#[derive(Debug, Clone, Copy)]
pub struct ClockRatio {
    pub numerator: u64,
    pub denominator: u64,
}

impl ClockRatio {
    pub const fn new(numerator: u64, denominator: u64) -> Self {
        ClockRatio { numerator, denominator }
    }

    pub fn scale(&self, master_cycles: Cycle) -> Cycle {
        master_cycles.saturating_mul(self.numerator) / self.denominator
    }

    pub fn unscale(&self, local_cycles: Cycle) -> Cycle {
        local_cycles.saturating_mul(self.denominator) / self.numerator
    }
}

pub struct Scheduler {
    now: Cycle,
    heap: BinaryHeap<Event>,
    next_seq: u64,
    /// Bumped whenever a target's outstanding events should be treated as
    /// stale (e.g. it was just reconfigured); cheaper than a heap scan.
    epochs: Vec<u32>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler { now: 0, heap: BinaryHeap::new(), next_seq: 0, epochs: vec![0; 16] }
    }

    pub fn now(&self) -> Cycle {
        self.now
    }

    fn epoch_slot(&mut self, target: EventTarget) -> &mut u32 {
        let idx = target as usize;
        if idx >= self.epochs.len() {
            self.epochs.resize(idx + 1, 0);
        }
        &mut self.epochs[idx]
    }

    pub fn schedule(&mut self, target: EventTarget, at: Cycle) {
        let epoch = *self.epoch_slot(target);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Event { time: at, seq, epoch, target });
    }

    pub fn schedule_after(&mut self, target: EventTarget, delta: Cycle) {
        let at = self.now.saturating_add(delta);
        self.schedule(target, at);
    }

    /// Invalidates every outstanding event for `target` without touching
    /// the heap; they are dropped lazily as they pop.
    pub fn cancel(&mut self, target: EventTarget) {
        *self.epoch_slot(target) = self.epoch_slot(target).wrapping_add(1);
    }

    /// Rescales every event's remaining distance from `now` by a new clock
    /// ratio change; called on an SMPC clock-change request. `scale` is
    /// applied as `new_distance = old_distance * numerator / denominator`.
    pub fn retime(&mut self, numerator: u64, denominator: u64) {
        let now = self.now;
        let rescaled: Vec<Event> = self
            .heap
            .drain()
            .map(|e| {
                let distance = e.time.saturating_sub(now);
                let new_distance = distance.saturating_mul(numerator) / denominator.max(1);
                Event { time: now + new_distance, seq: e.seq, epoch: e.epoch, target: e.target }
            })
            .collect();
        self.heap.extend(rescaled);
    }

    /// Pops and returns the next due event, advancing `now` to its time.
    /// Events whose epoch no longer matches the target's current epoch are
    /// silently discarded (the cancellation scheme in §4.8).
    pub fn pop(&mut self) -> Option<(Cycle, EventTarget)> {
        while let Some(event) = self.heap.pop() {
            if event.epoch != self.epochs.get(event.target as usize).copied().unwrap_or(0) {
                continue;
            }
            self.now = event.time;
            return Some((event.time, event.target));
        }
        None
    }

    pub fn pending(&self) -> usize {
        self.heap.len()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

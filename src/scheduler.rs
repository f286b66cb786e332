//! Mutation watch and debounce scheduling for re-filtering.
//!
//! Content on the host page grows asynchronously, and slowly after a
//! see-more click. The scheduler turns mutation, scroll and click
//! notifications into at most one pending re-filter per source, waiting
//! out a cooldown window after see-more clicks so a pass does not run
//! against a half-updated document.
//!
//! Time comes from a [`Clock`], so tests drive it with [`ManualClock`].

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use dom_query::Selection;
use log::debug;

use crate::classifier;
use crate::dom;
use crate::options::Options;

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Virtual clock advanced by hand.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Cell<Duration>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    /// Move virtual time forward.
    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Trailing-edge debouncer holding a single pending deadline.
///
/// Scheduling replaces any pending deadline, so only the last call of a
/// burst fires.
#[derive(Debug, Default, Clone, Copy)]
pub struct Debouncer {
    deadline: Option<Instant>,
}

impl Debouncer {
    /// Schedule a firing `delay` after `now`, cancelling any pending one.
    pub fn schedule(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Fire if the deadline has passed. Fires at most once per schedule.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// One batch entry delivered by the host's mutation observer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationRecord {
    pub added_nodes: usize,
    pub removed_nodes: usize,
}

/// Which watcher fired a re-filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefilterTrigger {
    Mutation,
    Scroll,
}

/// Timing policy of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTiming {
    pub see_more_cooldown: Duration,
    pub mutation_delay: Duration,
    pub scroll_delay: Duration,
    pub scroll_delay_after_see_more: Duration,
}

impl SchedulerTiming {
    #[must_use]
    pub fn from_options(options: &Options) -> Self {
        Self {
            see_more_cooldown: Duration::from_millis(options.see_more_cooldown_ms),
            mutation_delay: Duration::from_millis(options.mutation_delay_ms),
            scroll_delay: Duration::from_millis(options.scroll_delay_ms),
            scroll_delay_after_see_more: Duration::from_millis(options.scroll_delay_after_see_more_ms),
        }
    }
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self::from_options(&Options::default())
    }
}

/// Debounces re-filter requests from mutations and scrolling.
#[derive(Debug)]
pub struct RefilterScheduler<C: Clock> {
    clock: C,
    timing: SchedulerTiming,
    last_see_more_click: Option<Instant>,
    mutation_timer: Debouncer,
    scroll_timer: Debouncer,
}

impl<C: Clock> RefilterScheduler<C> {
    pub fn new(clock: C, timing: SchedulerTiming) -> Self {
        Self {
            clock,
            timing,
            last_see_more_click: None,
            mutation_timer: Debouncer::default(),
            scroll_timer: Debouncer::default(),
        }
    }

    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Remember that a see-more control was just clicked.
    pub fn record_see_more_click(&mut self) {
        self.last_see_more_click = Some(self.clock.now());
    }

    /// Route a click, before the page's own handlers see it.
    ///
    /// Records a see-more click when the target, or the nearest clickable
    /// element around it, is a see-more control. Returns whether it did.
    pub fn on_click(&mut self, target: &Selection) -> bool {
        let is_see_more = clickable_ancestor(target)
            .is_some_and(|control| classifier::element_is_see_more(&control));
        if is_see_more {
            debug!("see-more click recorded");
            self.record_see_more_click();
        }
        is_see_more
    }

    /// Handle one mutation batch. Schedules a re-filter if any record added nodes.
    pub fn on_mutations(&mut self, records: &[MutationRecord]) -> bool {
        if !records.iter().any(|record| record.added_nodes > 0) {
            return false;
        }
        let now = self.clock.now();
        let delay = self.mutation_delay(now);
        self.mutation_timer.schedule(now, delay);
        true
    }

    /// Handle a scroll event.
    pub fn on_scroll(&mut self) {
        let now = self.clock.now();
        let delay = if self.within_cooldown(now) {
            self.timing.scroll_delay_after_see_more
        } else {
            self.timing.scroll_delay
        };
        self.scroll_timer.schedule(now, delay);
    }

    /// Fire whichever pending re-filter is due. Mutation wins a tie; both
    /// timers are cleared since one pass serves both.
    pub fn poll(&mut self) -> Option<RefilterTrigger> {
        let now = self.clock.now();
        let mutation = self.mutation_timer.poll(now);
        let scroll = self.scroll_timer.poll(now);

        if mutation {
            if scroll {
                debug!("scroll re-filter merged into mutation re-filter");
            }
            Some(RefilterTrigger::Mutation)
        } else if scroll {
            Some(RefilterTrigger::Scroll)
        } else {
            None
        }
    }

    /// Earliest pending deadline, for hosts that sleep until the next firing.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.mutation_timer.deadline(), self.scroll_timer.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn within_cooldown(&self, now: Instant) -> bool {
        self.last_see_more_click
            .is_some_and(|clicked| now.duration_since(clicked) < self.timing.see_more_cooldown)
    }

    /// Remaining cooldown after a recent see-more click, else the short delay.
    fn mutation_delay(&self, now: Instant) -> Duration {
        match self.last_see_more_click {
            Some(clicked) => {
                let since = now.duration_since(clicked);
                if since < self.timing.see_more_cooldown {
                    self.timing.see_more_cooldown - since
                } else {
                    self.timing.mutation_delay
                }
            }
            None => self.timing.mutation_delay,
        }
    }
}

/// The target itself when clickable, else its nearest clickable ancestor.
fn clickable_ancestor<'a>(target: &Selection<'a>) -> Option<Selection<'a>> {
    let node = *target.nodes().first()?;
    let mut current = Some(node);
    while let Some(candidate) = current {
        if candidate.is_element() {
            let sel = Selection::from(candidate);
            let tag = dom::tag_name(&sel).unwrap_or_default();
            if tag == "button" || tag == "a" || dom::attr_or_empty(&sel, "role") == "button" {
                return Some(sel);
            }
        }
        current = candidate.parent();
    }
    None
}

//! Sequential advertiser scan.
//!
//! Walks the filtered card list in document order, resolves each card to
//! an advertiser, looks its ad count up through the background channel
//! (or the cache), paints a badge and reports progress. Lookups are spaced
//! by a fixed delay. A scan can be paused between cards and resumed at the
//! exact card it stopped before.
//!
//! The controller is driven through `&self` so a pause or status request
//! can interleave with a running scan on the same task; no `RefCell`
//! borrow is held across an await.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use dom_query::{Document, NodeId, Selection};
use log::{debug, info, warn};
use serde::Serialize;

use crate::advertiser::{self, ExtractorConfig};
use crate::badge::{self, BadgeOutcome};
use crate::cache::{CacheKey, LookupCache};
use crate::channel::BackgroundChannel;
use crate::classifier;
use crate::dom;
use crate::filter::{self, has_ad_content};
use crate::options::Options;
use crate::patterns::{AD_PAGELET_SELECTOR, ARTICLE_SELECTOR, MAIN_REGION_SELECTOR};
use crate::protocol::{CheckAdvertiser, LookupResult, ProgressUpdate};
use crate::scope::LookupScope;
use crate::url_utils;
use crate::{Error, Result};

/// Lifecycle phase of the scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanPhase {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
}

impl ScanPhase {
    /// Whether the state machine allows moving from `self` to `to`.
    #[must_use]
    pub fn can_transition_to(self, to: ScanPhase) -> bool {
        use ScanPhase::{Completed, Failed, Idle, Paused, Running};
        matches!(
            (self, to),
            (Idle, Running)
                | (Running, Paused | Completed | Failed)
                | (Paused, Running)
                | (Completed | Failed, Idle)
        )
    }
}

/// Running totals of one scan run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanTally {
    pub checked: usize,
    pub high: usize,
    pub low: usize,
}

/// What a scan call returned to its caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub paused: bool,
    pub completed: bool,
    /// The call was a no-op because a scan is already running.
    pub already_running: bool,
    pub checked: usize,
    pub high_count: usize,
    pub low_count: usize,
    pub total: usize,
    /// 1-based position: the next card when paused, `total` when completed.
    pub current: usize,
}

/// Point-in-time view of the scan, for status polling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSnapshot {
    pub phase: ScanPhase,
    pub is_checking: bool,
    pub is_paused: bool,
    pub checked: usize,
    pub high_count: usize,
    pub low_count: usize,
    pub total: usize,
    /// Index of the next card to process (0-based cursor).
    pub cursor: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Shared pause request flag.
///
/// Cloning shares the flag. A request is honoured at the top of the next
/// loop iteration; an in-flight lookup always completes first.
#[derive(Debug, Clone, Default)]
pub struct PauseSignal(Rc<Cell<bool>>);

impl PauseSignal {
    pub fn request(&self) {
        self.0.set(true);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.get()
    }

    fn take(&self) -> bool {
        self.0.replace(false)
    }

    fn clear(&self) {
        self.0.set(false);
    }
}

#[derive(Debug, Default)]
struct ScanState {
    phase: ScanPhase,
    cards: Vec<NodeId>,
    cursor: usize,
    tally: ScanTally,
    last_error: Option<String>,
}

impl ScanState {
    fn transition(&mut self, to: ScanPhase) -> Result<()> {
        if !self.phase.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        debug!("scan phase {:?} -> {:?}", self.phase, to);
        self.phase = to;
        Ok(())
    }

    fn report(&self) -> ScanReport {
        ScanReport {
            paused: self.phase == ScanPhase::Paused,
            completed: self.phase == ScanPhase::Completed,
            already_running: false,
            checked: self.tally.checked,
            high_count: self.tally.high,
            low_count: self.tally.low,
            total: self.cards.len(),
            current: match self.phase {
                ScanPhase::Completed => self.cards.len(),
                _ => self.cursor + 1,
            },
        }
    }

    fn progress(&self, current: usize) -> ProgressUpdate {
        ProgressUpdate {
            checked: self.tally.checked,
            high_count: self.tally.high,
            low_count: self.tally.low,
            total: self.cards.len(),
            current,
        }
    }
}

/// How a start request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartMode {
    AlreadyRunning,
    Resume,
    Fresh,
}

/// Policy values the scan loop reads.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub extractor: ExtractorConfig,
    pub high_count_threshold: u64,
    pub check_delay: Duration,
    pub ads_library_url: String,
    pub min_ad_text_len: usize,
}

impl ScanConfig {
    pub fn from_options(options: &Options) -> Result<Self> {
        Ok(Self {
            extractor: ExtractorConfig::from_options(options)?,
            high_count_threshold: options.high_count_threshold,
            check_delay: options.check_delay(),
            ads_library_url: options.ads_library_url.clone(),
            min_ad_text_len: options.min_ad_text_len,
        })
    }
}

/// Drives the sequential scan state machine. One per page.
#[derive(Debug)]
pub struct ScanController {
    config: ScanConfig,
    state: RefCell<ScanState>,
    pause: PauseSignal,
    cache: RefCell<LookupCache>,
}

impl ScanController {
    #[must_use]
    pub fn new(config: ScanConfig, cache: LookupCache) -> Self {
        Self {
            config,
            state: RefCell::new(ScanState::default()),
            pause: PauseSignal::default(),
            cache: RefCell::new(cache),
        }
    }

    /// Handle sharing this controller's pause flag.
    #[must_use]
    pub fn pause_signal(&self) -> PauseSignal {
        self.pause.clone()
    }

    /// Ask a running scan to pause before its next card.
    ///
    /// Returns false when no scan is running.
    pub fn request_pause(&self) -> bool {
        if self.state.borrow().phase != ScanPhase::Running {
            return false;
        }
        self.pause.request();
        true
    }

    #[must_use]
    pub fn phase(&self) -> ScanPhase {
        self.state.borrow().phase
    }

    #[must_use]
    pub fn status(&self) -> ScanSnapshot {
        let state = self.state.borrow();
        ScanSnapshot {
            phase: state.phase,
            is_checking: state.phase == ScanPhase::Running,
            is_paused: state.phase == ScanPhase::Paused,
            checked: state.tally.checked,
            high_count: state.tally.high,
            low_count: state.tally.low,
            total: state.cards.len(),
            cursor: state.cursor,
            last_error: state.last_error.clone(),
        }
    }

    /// Start a scan, resume a paused one, or do nothing if one is running.
    ///
    /// A fresh start snapshots the card list once; cards that appear later
    /// belong to the next run. Per-card failures are logged and skipped.
    /// Only run-level failures (cache persistence, an illegal transition)
    /// end the run in `Failed` and come back as `Err`.
    pub async fn check_advertisers(
        &self,
        doc: &Document,
        scope: &LookupScope,
        channel: &dyn BackgroundChannel,
    ) -> Result<ScanReport> {
        let mode = match self.begin(doc) {
            Ok(mode) => mode,
            Err(e) => return Err(self.fail(e)),
        };
        if mode == StartMode::AlreadyRunning {
            debug!("scan already running; start request ignored");
            let mut report = self.state.borrow().report();
            report.already_running = true;
            return Ok(report);
        }

        match self.run_loop(doc, scope, channel).await {
            Ok(report) => Ok(report),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Resume a paused scan. Anything else is left alone.
    pub async fn resume(
        &self,
        doc: &Document,
        scope: &LookupScope,
        channel: &dyn BackgroundChannel,
    ) -> Result<ScanReport> {
        if self.phase() != ScanPhase::Paused {
            let mut report = self.state.borrow().report();
            report.already_running = self.phase() == ScanPhase::Running;
            return Ok(report);
        }
        self.check_advertisers(doc, scope, channel).await
    }

    fn begin(&self, doc: &Document) -> Result<StartMode> {
        let mut state = self.state.borrow_mut();
        match state.phase {
            ScanPhase::Running => Ok(StartMode::AlreadyRunning),
            ScanPhase::Paused => {
                self.pause.clear();
                state.transition(ScanPhase::Running)?;
                info!(
                    "resuming scan at card {} of {}",
                    state.cursor + 1,
                    state.cards.len()
                );
                Ok(StartMode::Resume)
            }
            ScanPhase::Idle | ScanPhase::Completed | ScanPhase::Failed => {
                if state.phase != ScanPhase::Idle {
                    state.transition(ScanPhase::Idle)?;
                }
                state.cards = collect_scan_cards(doc, self.config.min_ad_text_len);
                state.cursor = 0;
                state.tally = ScanTally::default();
                state.last_error = None;
                self.pause.clear();
                state.transition(ScanPhase::Running)?;
                info!("starting scan over {} cards", state.cards.len());
                Ok(StartMode::Fresh)
            }
        }
    }

    fn fail(&self, error: Error) -> Error {
        let mut state = self.state.borrow_mut();
        warn!("scan failed: {error}");
        if state.phase.can_transition_to(ScanPhase::Failed) {
            state.phase = ScanPhase::Failed;
        }
        state.last_error = Some(error.to_string());
        error
    }

    async fn run_loop(
        &self,
        doc: &Document,
        scope: &LookupScope,
        channel: &dyn BackgroundChannel,
    ) -> Result<ScanReport> {
        loop {
            let (index, card_id) = {
                let state = self.state.borrow();
                match state.cards.get(state.cursor) {
                    Some(id) => (state.cursor, *id),
                    None => break,
                }
            };

            if self.pause.take() {
                let mut state = self.state.borrow_mut();
                state.cursor = index;
                state.transition(ScanPhase::Paused)?;
                info!(
                    "scan paused before card {} ({} checked)",
                    index + 1,
                    state.tally.checked
                );
                return Ok(state.report());
            }

            let looked_up = self.process_card(doc, scope, channel, index, card_id).await?;
            self.state.borrow_mut().cursor = index + 1;

            if looked_up {
                tokio::time::sleep(self.config.check_delay).await;
            }
        }

        let mut state = self.state.borrow_mut();
        state.transition(ScanPhase::Completed)?;
        let total = state.cards.len();
        report_progress(channel, state.progress(total));
        info!(
            "scan completed: {} checked, {} high, {} low",
            state.tally.checked, state.tally.high, state.tally.low
        );
        Ok(state.report())
    }

    /// Process one card. Returns whether a lookup was attempted, which is
    /// what the rate-limit delay follows.
    async fn process_card(
        &self,
        doc: &Document,
        scope: &LookupScope,
        channel: &dyn BackgroundChannel,
        index: usize,
        card_id: NodeId,
    ) -> Result<bool> {
        let Some(card) = dom::node_by_id(doc, card_id) else {
            warn!("card {} left the document; skipping", index + 1);
            return Ok(false);
        };

        let candidates = advertiser::extract_advertisers(&card, &self.config.extractor);
        let Some(top) = candidates.into_iter().next() else {
            info!("no advertiser found in card {}; skipping", index + 1);
            return Ok(false);
        };

        let key = CacheKey::new(&top.username, scope);
        let cached = self.cache.borrow().get(&key);
        let (result, from_cache) = match cached {
            Some(result) => {
                debug!("cache hit for {}", top.username);
                (Some(result), true)
            }
            None => (lookup(channel, &top.username, scope).await, false),
        };

        let Some(result) = result else {
            return Ok(true);
        };

        let result_url = if result.url.is_empty() {
            url_utils::ads_library_url(&self.config.ads_library_url, &top.username, scope)?
        } else {
            result.url.clone()
        };
        if !from_cache {
            self.cache.borrow_mut().put(&key, &result)?;
        }

        let outcome = badge::attach_badge(
            &card,
            result.count,
            &result_url,
            self.config.high_count_threshold,
        );
        if outcome == BadgeOutcome::AlreadyPresent {
            debug!("card {} already has a badge", index + 1);
        }

        let update = {
            let mut state = self.state.borrow_mut();
            state.tally.checked += 1;
            if badge::is_high_count(result.count, self.config.high_count_threshold) {
                state.tally.high += 1;
            } else {
                state.tally.low += 1;
            }
            state.progress(index + 1)
        };
        report_progress(channel, update);
        Ok(true)
    }
}

async fn lookup(
    channel: &dyn BackgroundChannel,
    advertiser: &str,
    scope: &LookupScope,
) -> Option<LookupResult> {
    let request = CheckAdvertiser {
        advertiser: advertiser.to_string(),
        country: scope.country.clone(),
        date_range: scope.date_range.clone(),
    };
    match channel.check_advertiser(request).await {
        Ok(response) => {
            let error = response.error.clone();
            let result = response.into_result();
            if result.is_none() {
                warn!(
                    "lookup for {advertiser} returned no result: {}",
                    error.as_deref().unwrap_or("unknown error")
                );
            }
            result
        }
        Err(e) => {
            warn!("lookup for {advertiser} failed: {e}");
            None
        }
    }
}

fn report_progress(channel: &dyn BackgroundChannel, update: ProgressUpdate) {
    if let Err(e) = channel.send_progress(update) {
        debug!("progress update not delivered: {e}");
    }
}

/// Cards a scan run covers, in document order.
///
/// Rendered discovery-tier candidates with a target action; when there are
/// none, the innermost rendered ad-like `div`s carrying a target action
/// under the main region (or the body).
#[must_use]
pub fn collect_scan_cards(doc: &Document, min_ad_text_len: usize) -> Vec<NodeId> {
    let primary: Vec<NodeId> = [ARTICLE_SELECTOR, AD_PAGELET_SELECTOR]
        .into_iter()
        .map(|selector| {
            doc.select(selector)
                .iter()
                .filter(|card| is_scan_card(card))
                .filter_map(|card| dom::node_id(&card))
                .collect::<Vec<_>>()
        })
        .find(|found| !found.is_empty())
        .unwrap_or_default();
    if !primary.is_empty() {
        return primary;
    }

    let region = doc
        .select(MAIN_REGION_SELECTOR)
        .iter()
        .next()
        .unwrap_or_else(|| doc.select("body"));
    let fallback = filter::innermost(region.select("div").iter().filter(|div| {
        has_ad_content(div, min_ad_text_len) && is_scan_card(div)
    }));

    let mut seen = HashSet::new();
    fallback
        .iter()
        .filter_map(dom::node_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

fn is_scan_card(card: &Selection) -> bool {
    dom::is_rendered(card) && classifier::has_target_action(card)
}

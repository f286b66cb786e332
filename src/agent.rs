//! Page agent: one instance per loaded host page.
//!
//! Owns the document and wires the filter pass, the re-filter scheduler
//! and the scan controller to the events and commands the host delivers.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use dom_query::{Document, NodeId};
use log::{debug, info};
use url::Url;

use crate::cache::{CacheStore, LookupCache};
use crate::channel::BackgroundChannel;
use crate::classifier;
use crate::dom;
use crate::filter::{FilterController, FilterOutcome};
use crate::options::Options;
use crate::patterns::INTERACTIVE_SELECTOR;
use crate::protocol::{Command, CommandReply, ManualFilterReport};
use crate::scan::{ScanConfig, ScanController, ScanPhase, ScanReport};
use crate::scheduler::{
    Clock, MutationRecord, RefilterScheduler, RefilterTrigger, SchedulerTiming, SystemClock,
};
use crate::scope::LookupScope;
use crate::Result;

/// Host-side effects the agent cannot perform on its own document model.
pub trait PageHost {
    /// Dispatch a user-equivalent click on the element.
    fn click(&self, node: NodeId);
}

/// Events delivered by the host page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// A click, seen before the page's own handlers.
    Click(NodeId),
    Mutations(Vec<MutationRecord>),
    Scroll,
}

/// What a [`PageAgent::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Outcome of the re-filter pass, if one was due.
    pub filter: Option<FilterOutcome>,
    /// The host should start a scan now.
    pub auto_check: bool,
}

pub struct PageAgent<C: Clock = SystemClock> {
    document: Document,
    page_url: Url,
    options: Options,
    filter: FilterController,
    scheduler: RefCell<RefilterScheduler<C>>,
    scan: ScanController,
}

impl PageAgent<SystemClock> {
    /// Agent over `html` served at `page_url`, on the wall clock.
    pub fn new(
        html: &str,
        page_url: &str,
        options: Options,
        store: Box<dyn CacheStore>,
    ) -> Result<Self> {
        Self::with_clock(html, page_url, options, store, SystemClock)
    }
}

impl<C: Clock> PageAgent<C> {
    pub fn with_clock(
        html: &str,
        page_url: &str,
        options: Options,
        store: Box<dyn CacheStore>,
        clock: C,
    ) -> Result<Self> {
        options.validate()?;
        let page_url = Url::parse(page_url)?;
        let cache = LookupCache::new(store, Duration::from_secs(options.cache_ttl_secs));
        let scan = ScanController::new(ScanConfig::from_options(&options)?, cache);
        let scheduler = RefilterScheduler::new(clock, SchedulerTiming::from_options(&options));

        Ok(Self {
            document: dom::parse(html),
            page_url,
            filter: FilterController::new(options.min_ad_text_len),
            scheduler: RefCell::new(scheduler),
            scan,
            options,
        })
    }

    #[must_use]
    pub fn document(&self) -> &Document {
        &self.document
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    #[must_use]
    pub fn scan(&self) -> &ScanController {
        &self.scan
    }

    /// Country and date window read from the page URL.
    #[must_use]
    pub fn scope(&self) -> LookupScope {
        LookupScope::from_page_url(&self.page_url, &self.options.default_country)
    }

    /// Initial filter pass once the page is loaded.
    pub fn on_load(&self) -> FilterOutcome {
        self.filter.run(&self.document)
    }

    pub fn on_event(&self, event: PageEvent) {
        let mut scheduler = self.scheduler.borrow_mut();
        match event {
            PageEvent::Click(node) => {
                if let Some(target) = dom::node_by_id(&self.document, node) {
                    scheduler.on_click(&target);
                }
            }
            PageEvent::Mutations(records) => {
                scheduler.on_mutations(&records);
            }
            PageEvent::Scroll => scheduler.on_scroll(),
        }
    }

    /// Run a re-filter pass if one is due.
    pub fn tick(&self) -> TickOutcome {
        let trigger = self.scheduler.borrow_mut().poll();
        let Some(trigger) = trigger else {
            return TickOutcome::default();
        };

        let outcome = self.filter.run(&self.document);
        let auto_check = trigger == RefilterTrigger::Scroll
            && self.options.auto_check_on_scroll
            && !matches!(self.scan.phase(), ScanPhase::Running | ScanPhase::Paused);
        if auto_check {
            debug!("scroll re-filter requests an automatic scan");
        }
        TickOutcome {
            filter: Some(outcome),
            auto_check,
        }
    }

    /// When the next re-filter is due, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.borrow().next_deadline()
    }

    /// Handle a popup command.
    ///
    /// Commands take `&self`, so a pause or status request can be handled
    /// while a scan started by an earlier command is still awaiting.
    pub async fn handle_command(
        &self,
        command: Command,
        channel: &dyn BackgroundChannel,
        host: &dyn PageHost,
    ) -> CommandReply {
        match command {
            Command::CheckAdvertisers => {
                let scope = self.scope();
                scan_reply(self.scan.check_advertisers(&self.document, &scope, channel).await)
            }
            Command::PauseChecking => {
                if self.scan.request_pause() {
                    CommandReply::Ack { success: true }
                } else {
                    CommandReply::failure("no scan is running")
                }
            }
            Command::ResumeChecking => {
                if self.scan.phase() != ScanPhase::Paused {
                    return CommandReply::failure("scan is not paused");
                }
                let scope = self.scope();
                scan_reply(self.scan.resume(&self.document, &scope, channel).await)
            }
            Command::GetStatus => CommandReply::Status(self.scan.status()),
            Command::ManualFilter => CommandReply::Filter {
                success: true,
                report: self.manual_filter(host).await,
            },
        }
    }

    /// Filter now, then click every rendered see-more control.
    async fn manual_filter(&self, host: &dyn PageHost) -> ManualFilterReport {
        let outcome = self.filter.run(&self.document);
        let controls = self.see_more_controls();
        let stagger = self.options.manual_click_stagger();

        for (i, node) in controls.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(stagger).await;
            }
            host.click(*node);
            self.scheduler.borrow_mut().record_see_more_click();
        }

        info!("manual filter clicked {} see-more controls", controls.len());
        ManualFilterReport {
            shown: outcome.shown,
            hidden: outcome.hidden,
            see_more_clicked: controls.len(),
        }
    }

    fn see_more_controls(&self) -> Vec<NodeId> {
        self.document
            .select(INTERACTIVE_SELECTOR)
            .iter()
            .filter(|control| dom::is_rendered(control) && classifier::element_is_see_more(control))
            .filter_map(|control| dom::node_id(&control))
            .collect()
    }
}

fn scan_reply(result: Result<ScanReport>) -> CommandReply {
    match result {
        Ok(report) => CommandReply::Scan {
            success: true,
            report,
        },
        Err(e) => CommandReply::failure(e.to_string()),
    }
}

impl<C: Clock> std::fmt::Debug for PageAgent<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageAgent")
            .field("page_url", &self.page_url.as_str())
            .field("scan", &self.scan.phase())
            .finish_non_exhaustive()
    }
}

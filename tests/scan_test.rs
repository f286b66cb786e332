use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use adscout::agent::{PageAgent, PageHost};
use adscout::cache::{FileStore, MemoryStore};
use adscout::channel::BackgroundChannel;
use adscout::dom::{self, NodeId};
use adscout::protocol::{
    CheckAdvertiser, CheckAdvertiserResponse, Command, CommandReply, LookupResult, ProgressUpdate,
};
use adscout::scan::{ScanPhase, ScanReport};
use adscout::{Error, Options};
use async_trait::async_trait;

const PAGE_URL: &str = "https://www.facebook.com/ads/library/?country=BR&start_date[min]=2024-01-01";

/// Background double answering from a fixed count table.
#[derive(Default)]
struct FakeBackground {
    counts: HashMap<String, u64>,
    calls: RefCell<Vec<CheckAdvertiser>>,
    progress: RefCell<Vec<ProgressUpdate>>,
}

impl FakeBackground {
    fn with_counts(counts: &[(&str, u64)]) -> Self {
        Self {
            counts: counts.iter().map(|(h, c)| ((*h).to_string(), *c)).collect(),
            ..Self::default()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    fn last_progress(&self) -> Option<ProgressUpdate> {
        self.progress.borrow().last().copied()
    }
}

#[async_trait(?Send)]
impl BackgroundChannel for FakeBackground {
    async fn check_advertiser(
        &self,
        request: CheckAdvertiser,
    ) -> adscout::Result<CheckAdvertiserResponse> {
        self.calls.borrow_mut().push(request.clone());
        Ok(match self.counts.get(&request.advertiser) {
            Some(count) => CheckAdvertiserResponse::found(LookupResult {
                count: *count,
                url: format!("https://lookup.test/{}", request.advertiser),
            }),
            None => CheckAdvertiserResponse::failed("advertiser not found"),
        })
    }

    fn send_progress(&self, update: ProgressUpdate) -> adscout::Result<()> {
        self.progress.borrow_mut().push(update);
        Ok(())
    }
}

struct NoClicks;

impl PageHost for NoClicks {
    fn click(&self, _node: NodeId) {}
}

fn listing(handles: &[&str]) -> String {
    let cards: String = handles
        .iter()
        .enumerate()
        .map(|(i, handle)| {
            format!(
                r#"<div role="article" id="card-{i}">
                     <a href="https://www.facebook.com/{handle}">{handle}</a>
                     <img src="creative.jpg">
                     <div role="button">Shop now</div>
                   </div>"#
            )
        })
        .collect();
    format!("<html><body><div role=\"main\">{cards}</div></body></html>")
}

fn ten_brands() -> (Vec<String>, Vec<(String, u64)>) {
    let handles: Vec<String> = (1..=10).map(|i| format!("brand{i}")).collect();
    let counts = handles
        .iter()
        .enumerate()
        .map(|(i, h)| (h.clone(), (i as u64 + 1) * 10))
        .collect();
    (handles, counts)
}

fn agent_for(handles: &[&str]) -> PageAgent {
    PageAgent::new(
        &listing(handles),
        PAGE_URL,
        Options::default(),
        Box::new(MemoryStore::new()),
    )
    .expect("agent")
}

fn scan_report(reply: CommandReply) -> ScanReport {
    match reply {
        CommandReply::Scan { success: true, report } => report,
        other => panic!("expected a scan report, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn pause_after_fourth_card_then_resume_finishes_all_ten() {
    let (handles, counts) = ten_brands();
    let handle_refs: Vec<&str> = handles.iter().map(String::as_str).collect();
    let count_refs: Vec<(&str, u64)> = counts.iter().map(|(h, c)| (h.as_str(), *c)).collect();
    let background = FakeBackground::with_counts(&count_refs);
    let agent = agent_for(&handle_refs);

    // Lookups happen at t = 0, 1s, 2s, 3s; the pause lands while the fourth
    // card's rate-limit delay is running.
    let (scan, pause) = tokio::join!(
        agent.handle_command(Command::CheckAdvertisers, &background, &NoClicks),
        async {
            tokio::time::sleep(Duration::from_millis(3_500)).await;
            agent
                .handle_command(Command::PauseChecking, &background, &NoClicks)
                .await
        }
    );

    assert_eq!(pause, CommandReply::Ack { success: true });
    let report = scan_report(scan);
    assert!(report.paused);
    assert!(!report.completed);
    assert_eq!(report.current, 5);
    assert_eq!(report.checked, 4);
    assert_eq!(report.high_count, 2);
    assert_eq!(report.low_count, 2);
    assert_eq!(report.total, 10);
    assert_eq!(background.call_count(), 4);
    assert_eq!(agent.scan().phase(), ScanPhase::Paused);

    let resumed = scan_report(
        agent
            .handle_command(Command::ResumeChecking, &background, &NoClicks)
            .await,
    );
    assert!(resumed.completed);
    assert_eq!(resumed.checked, 10);
    assert_eq!(resumed.high_count, 8);
    assert_eq!(resumed.low_count, 2);
    assert_eq!(resumed.current, 10);

    let advertisers: Vec<String> = background
        .calls
        .borrow()
        .iter()
        .map(|call| call.advertiser.clone())
        .collect();
    assert_eq!(advertisers, handles, "each card looked up once, in order");
    assert_eq!(
        background.last_progress(),
        Some(ProgressUpdate {
            checked: 10,
            high_count: 8,
            low_count: 2,
            total: 10,
            current: 10,
        })
    );
}

#[tokio::test(start_paused = true)]
async fn lookups_are_spaced_by_the_check_delay() {
    let background = FakeBackground::with_counts(&[("alpha", 1), ("bravo", 2), ("charlie", 3)]);
    let agent = agent_for(&["alpha", "bravo", "charlie"]);

    let started = tokio::time::Instant::now();
    let report = scan_report(
        agent
            .handle_command(Command::CheckAdvertisers, &background, &NoClicks)
            .await,
    );

    assert!(report.completed);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn start_while_running_is_a_no_op() {
    let background = FakeBackground::with_counts(&[("alpha", 1), ("bravo", 2)]);
    let agent = agent_for(&["alpha", "bravo"]);

    let (first, second) = tokio::join!(
        agent.handle_command(Command::CheckAdvertisers, &background, &NoClicks),
        async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            agent
                .handle_command(Command::CheckAdvertisers, &background, &NoClicks)
                .await
        }
    );

    assert!(scan_report(first).completed);
    assert!(scan_report(second).already_running);
    assert_eq!(background.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn same_handle_within_ttl_is_served_from_cache() {
    let background = FakeBackground::with_counts(&[("coolbrand", 40)]);
    let agent = agent_for(&["coolbrand", "coolbrand"]);

    let report = scan_report(
        agent
            .handle_command(Command::CheckAdvertisers, &background, &NoClicks)
            .await,
    );
    assert_eq!(report.checked, 2);
    assert_eq!(background.call_count(), 1);

    // A fresh run over the same page hits the cache as well.
    let again = scan_report(
        agent
            .handle_command(Command::CheckAdvertisers, &background, &NoClicks)
            .await,
    );
    assert_eq!(again.checked, 2);
    assert_eq!(background.call_count(), 1);

    let call = &background.calls.borrow()[0];
    assert_eq!(call.country, "BR");
    assert_eq!(call.date_range.start.as_deref(), Some("2024-01-01"));
}

#[tokio::test(start_paused = true)]
async fn failed_lookups_are_skipped_and_not_cached() {
    let background = FakeBackground::with_counts(&[("alpha", 1), ("charlie", 3)]);
    let agent = agent_for(&["alpha", "ghost", "charlie"]);

    let report = scan_report(
        agent
            .handle_command(Command::CheckAdvertisers, &background, &NoClicks)
            .await,
    );
    assert!(report.completed);
    assert_eq!(report.checked, 2);
    assert!(!agent.document().select("#card-1 [data-adscout-badge]").exists());
    assert!(agent.document().select("#card-2 [data-adscout-badge]").exists());

    agent
        .handle_command(Command::CheckAdvertisers, &background, &NoClicks)
        .await;
    let ghost_calls = background
        .calls
        .borrow()
        .iter()
        .filter(|call| call.advertiser == "ghost")
        .count();
    assert_eq!(ghost_calls, 2);
}

#[tokio::test(start_paused = true)]
async fn badges_use_result_url_and_are_never_duplicated() {
    let background = FakeBackground::with_counts(&[("bigspender", 120), ("smallshop", 3)]);
    let agent = agent_for(&["bigspender", "smallshop"]);

    for _ in 0..2 {
        agent
            .handle_command(Command::CheckAdvertisers, &background, &NoClicks)
            .await;
    }

    let doc = agent.document();
    assert_eq!(doc.select("[data-adscout-badge]").length(), 2);

    let high = doc.select(r#"#card-0 a[data-adscout-badge="high"]"#);
    assert_eq!(dom::get_attribute(&high, "href").as_deref(), Some("https://lookup.test/bigspender"));
    assert_eq!(high.text().to_string(), "100+");

    let low = doc.select(r#"#card-1 [data-adscout-badge="low"]"#);
    assert_eq!(low.text().to_string(), "3");
}

#[tokio::test(start_paused = true)]
async fn cards_without_advertiser_are_skipped_without_delay() {
    let html = r#"<html><body>
        <div role="article" id="anon"><img src="a.jpg"><div role="button">Shop now</div></div>
        <div role="article" id="named"><a href="/NamedBrand">NamedBrand</a><img src="b.jpg"><div role="button">Shop now</div></div>
    </body></html>"#;
    let background = FakeBackground::with_counts(&[("namedbrand", 5)]);
    let agent = PageAgent::new(html, PAGE_URL, Options::default(), Box::new(MemoryStore::new()))
        .expect("agent");

    let started = tokio::time::Instant::now();
    let report = scan_report(
        agent
            .handle_command(Command::CheckAdvertisers, &background, &NoClicks)
            .await,
    );

    assert_eq!(report.total, 2);
    assert_eq!(report.checked, 1);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(1), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn empty_page_completes_with_zero_total() {
    let background = FakeBackground::default();
    let agent = PageAgent::new(
        "<html><body><p>nothing here</p></body></html>",
        PAGE_URL,
        Options::default(),
        Box::new(MemoryStore::new()),
    )
    .expect("agent");

    let report = scan_report(
        agent
            .handle_command(Command::CheckAdvertisers, &background, &NoClicks)
            .await,
    );
    assert!(report.completed);
    assert_eq!(report.total, 0);
    assert_eq!(background.last_progress().map(|p| p.total), Some(0));
}

#[tokio::test(start_paused = true)]
async fn cache_write_failure_fails_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileStore::open(dir.path().join("cache.json")).expect("store");
    dir.close().expect("remove tempdir");

    let background = FakeBackground::with_counts(&[("alpha", 1)]);
    let agent = PageAgent::new(&listing(&["alpha"]), PAGE_URL, Options::default(), Box::new(store))
        .expect("agent");

    let scope = agent.scope();
    let result = agent
        .scan()
        .check_advertisers(agent.document(), &scope, &background)
        .await;
    assert!(matches!(result, Err(Error::CacheError(_))));

    let status = agent.scan().status();
    assert_eq!(status.phase, ScanPhase::Failed);
    assert!(status.last_error.is_some());
    assert_eq!(status.checked, 0);
    assert!(!agent.document().select("#card-0 [data-adscout-badge]").exists());

    // The unsaved result is not served from memory on the next run.
    let reply = agent
        .handle_command(Command::CheckAdvertisers, &background, &NoClicks)
        .await;
    assert!(matches!(reply, CommandReply::Failure { success: false, .. }));
    assert_eq!(background.call_count(), 2);
    assert!(!agent.document().select("#card-0 [data-adscout-badge]").exists());
}

#[tokio::test(start_paused = true)]
async fn persistent_cache_survives_a_reload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("cache.json");
    let background = FakeBackground::with_counts(&[("alpha", 30)]);

    for _ in 0..2 {
        let store = FileStore::open(&path).expect("store");
        let agent = PageAgent::new(&listing(&["alpha"]), PAGE_URL, Options::default(), Box::new(store))
            .expect("agent");
        let report = scan_report(
            agent
                .handle_command(Command::CheckAdvertisers, &background, &NoClicks)
                .await,
        );
        assert_eq!(report.high_count, 1);
    }

    assert_eq!(background.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn status_reflects_a_running_scan() {
    let background = FakeBackground::with_counts(&[("alpha", 1), ("bravo", 2), ("charlie", 3)]);
    let agent = agent_for(&["alpha", "bravo", "charlie"]);

    let (_, status) = tokio::join!(
        agent.handle_command(Command::CheckAdvertisers, &background, &NoClicks),
        async {
            tokio::time::sleep(Duration::from_millis(1_500)).await;
            agent
                .handle_command(Command::GetStatus, &background, &NoClicks)
                .await
        }
    );

    let CommandReply::Status(snapshot) = status else {
        panic!("expected status, got {status:?}");
    };
    assert!(snapshot.is_checking);
    assert!(!snapshot.is_paused);
    assert_eq!(snapshot.checked, 2);
    assert_eq!(snapshot.total, 3);
}

use adscout::advertiser::{extract_advertisers, handle_from_href, is_valid_handle, ExtractorConfig};
use adscout::dom::parse;
use adscout::{Options, PriorityWeights};

fn card_candidates(html: &str) -> Vec<(String, u32)> {
    let doc = parse(html);
    let card = doc.select("#card");
    extract_advertisers(&card, &ExtractorConfig::default())
        .into_iter()
        .map(|c| (c.username, c.priority_score))
        .collect()
}

#[test]
fn redirector_is_rejected_and_profile_link_yields_lowercase_handle() {
    let config = ExtractorConfig::default();
    assert_eq!(
        handle_from_href("https://www.facebook.com/l.php?u=https%3A%2F%2Fshop.example%2F", &config),
        None
    );
    assert_eq!(
        handle_from_href("https://www.facebook.com/CoolBrand123", &config),
        Some("coolbrand123".to_string())
    );
}

#[test]
fn card_with_redirect_and_profile_links_ranks_profile_first() {
    let candidates = card_candidates(
        r#"<div id="card">
            <a href="https://l.facebook.com/l.php?u=https%3A%2F%2Fshop.example%2F">shop.example</a>
            <a href="https://www.facebook.com/l.php?u=x">Visit</a>
            <a href="https://www.facebook.com/CoolBrand123"><span>CoolBrand123</span></a>
            <div role="button">Shop now</div>
        </div>"#,
    );

    assert_eq!(candidates.len(), 1);
    // text 10 + visible 5 + length 3 + no dot 2
    assert_eq!(candidates[0], ("coolbrand123".to_string(), 20));
}

#[test]
fn relative_links_resolve_against_host_and_dedupe() {
    let candidates = card_candidates(
        r#"<div id="card">
            <a href="/loja.brasil"><img src="logo.png"></a>
            <a href="/loja.brasil?ref=ad">Loja Brasil</a>
            <a href="https://m.facebook.com/otherbrand/">otherbrand</a>
        </div>"#,
    );

    let names: Vec<&str> = candidates.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["otherbrand", "loja.brasil"]);
}

#[test]
fn platform_paths_and_foreign_hosts_are_never_candidates() {
    let candidates = card_candidates(
        r#"<div id="card">
            <a href="https://www.facebook.com/help/123">Help</a>
            <a href="https://www.facebook.com/ads/library/?q=x">Library</a>
            <a href="https://www.facebook.com/policies">Policies</a>
            <a href="https://www.facebook.com/123456789">numeric</a>
            <a href="https://www.facebook.com/ab">too short</a>
            <a href="https://example.com/realbrand">realbrand</a>
            <a href="https://www.facebook.com/helpfulstore">helpfulstore</a>
        </div>"#,
    );

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].0, "helpfulstore");
}

#[test]
fn ties_keep_document_order() {
    let first = card_candidates(
        r#"<div id="card"><a href="/alphabrand">x</a><a href="/bravobrand">y</a></div>"#,
    );
    let second = card_candidates(
        r#"<div id="card"><a href="/alphabrand">x</a><a href="/bravobrand">y</a></div>"#,
    );

    assert_eq!(first, second);
    assert_eq!(first[0].0, "alphabrand");
    assert_eq!(first[0].1, first[1].1);
}

#[test]
fn hidden_anchor_scores_lower_than_visible_one() {
    let candidates = card_candidates(
        r#"<div id="card">
            <div style="display:none"><a href="/hiddenbrand">hiddenbrand</a></div>
            <a href="/shownbrand">shownbrand</a>
        </div>"#,
    );

    assert_eq!(candidates[0], ("shownbrand".to_string(), 20));
    assert_eq!(candidates[1], ("hiddenbrand".to_string(), 15));
}

#[test]
fn text_fallback_finds_written_out_profile_link() {
    let candidates = card_candidates(
        r#"<div id="card"><p>Follow us at facebook.com/TextBrand. for deals</p></div>"#,
    );
    assert_eq!(candidates, [("textbrand".to_string(), 1)]);

    let none = card_candidates(r#"<div id="card"><p>No links in this card</p></div>"#);
    assert!(none.is_empty());
}

#[test]
fn every_extracted_handle_satisfies_the_handle_rules() {
    let long = "a".repeat(60);
    let html = format!(
        r#"<div id="card">
            <a href="/{long}">long</a>
            <a href="/.dotted">dot</a>
            <a href="/trailing.">dot</a>
            <a href="/000111">digits</a>
            <a href="/fine_brand-01">fine</a>
            <a href="/watch">watch</a>
        </div>"#
    );

    for (handle, _) in card_candidates(&html) {
        let len = handle.chars().count();
        assert!((3..=50).contains(&len), "{handle}");
        assert!(!handle.chars().all(|c| c.is_ascii_digit()), "{handle}");
        assert!(!handle.starts_with('.') && !handle.ends_with('.'), "{handle}");
        assert!(is_valid_handle(&handle));
    }
}

#[test]
fn weights_come_from_options() {
    let options = Options {
        weights: PriorityWeights {
            visible: 50,
            ..PriorityWeights::default()
        },
        ..Options::default()
    };
    let config = ExtractorConfig::from_options(&options).expect("config");
    let doc = parse(r#"<div id="card"><a href="/somebrand">other text</a></div>"#);

    let candidates = extract_advertisers(&doc.select("#card"), &config);
    assert_eq!(candidates[0].priority_score, 50 + 3 + 2);
    assert_eq!(candidates[0].profile_url, "https://www.facebook.com/somebrand");
}

#[test]
fn text_fallback_uses_first_profile_mention_that_is_not_a_platform_page() {
    let candidates = card_candidates(
        r#"<div id="card"><p>Sign in via www.facebook.com/login.php, then like facebook.com/TextBrand</p></div>"#,
    );
    assert_eq!(candidates, [("textbrand".to_string(), 1)]);

    let candidates = card_candidates(
        r#"<div id="card"><p>Read facebook.com/policies before buying</p></div>"#,
    );
    assert!(candidates.is_empty());
}

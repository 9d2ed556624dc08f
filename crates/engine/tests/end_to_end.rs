// ABOUTME: Integration tests running whole documents through the Extractor.
// ABOUTME: Covers generic fallback, site profiles with XPath, embedded script data and failure modes.

use newsloom_engine::{
    ContentItem, EmbeddedDataHint, ExtractError, ExtractionStrategy, Extractor, RecoveryStage,
    SiteProfile, Slot, SourceDocument, ValidationError,
};
use pretty_assertions::assert_eq;
use url::Url;

fn origin() -> Url {
    Url::parse("https://news.example.com").unwrap()
}

fn doc(markup: &str) -> SourceDocument {
    SourceDocument::new(markup, origin())
}

fn texts(article: &newsloom_engine::Article) -> Vec<String> {
    article
        .contents()
        .iter()
        .map(|item| item.payload().to_string())
        .collect()
}

fn wechat_profile() -> SiteProfile {
    let mut profile = SiteProfile::new("wechat");
    profile.title = vec![ExtractionStrategy::xpath(r#"//h1[@id="activity-name"]/text()"#)].into();
    profile.author = vec![ExtractionStrategy::css("#js_name")].into();
    profile.date = vec![ExtractionStrategy::css("#publish_time")].into();
    profile.content_root = vec![ExtractionStrategy::xpath(r#"//div[@id="js_content"]"#)].into();
    profile.removal = vec![ExtractionStrategy::css(".qr_code_pc")].into();
    profile.embedded = Some(EmbeddedDataHint::new("window.cgiDataNew"));
    profile
}

#[test]
fn heading_paragraph_image_and_list_in_source_order() {
    let markup = r#"<!DOCTYPE html>
<html>
<head><title>Harbour reopens | Port Daily</title></head>
<body>
<article>
  <h1>Harbour reopens</h1>
  <p>Ships returned on Monday. <img src="/img/quay.jpg" alt="The quay"></p>
  <ul><li>Berth 4 is open</li><li>Berth 5 opens Friday</li></ul>
</article>
</body>
</html>"#;

    let article = Extractor::builder().build().extract(&doc(markup)).unwrap();

    assert_eq!(article.title(), "Harbour reopens");
    assert_eq!(
        article.contents().as_slice(),
        &[
            ContentItem::text("Harbour reopens"),
            ContentItem::image("https://news.example.com/img/quay.jpg", None),
            ContentItem::text("Ships returned on Monday."),
            ContentItem::text("• Berth 4 is open"),
            ContentItem::text("• Berth 5 opens Friday"),
        ]
    );
    assert_eq!(article.images(), ["https://news.example.com/img/quay.jpg"]);
    assert!(article.videos().is_empty());
}

#[test]
fn generic_lists_cover_pages_without_a_profile() {
    let markup = r#"<html><head>
        <meta property="og:title" content="Ignored because h1 wins">
        <meta property="article:published_time" content="2024-03-05T06:30:00Z">
        <meta property="og:site_name" content="Port Daily">
    </head><body>
        <main>
            <h1 class="article-title">Storm closes ferry routes</h1>
            <span class="byline">Mara Ortiz</span>
            <p>All crossings are suspended.</p>
            <video src="/media/storm.mp4"></video>
        </main>
    </body></html>"#;

    let article = Extractor::default().extract(&doc(markup)).unwrap();
    let meta = article.metadata();

    assert_eq!(article.title(), "Storm closes ferry routes");
    assert_eq!(meta.author_name.as_deref(), Some("Mara Ortiz"));
    assert_eq!(meta.publish_time.as_deref(), Some("2024-03-05 06:30:00"));
    assert_eq!(meta.source.as_deref(), Some("Port Daily"));
    assert_eq!(article.videos(), ["https://news.example.com/media/storm.mp4"]);
}

#[test]
fn profile_with_xpath_and_removal() {
    let markup = r#"<html><body>
        <h1 id="activity-name">
            港口重新开放
        </h1>
        <a id="js_name">Port Daily</a>
        <em id="publish_time">2024年3月5日 14:30</em>
        <div id="js_content">
            <p>第一段</p>
            <p><img data-src="https://mmbiz.qpic.cn/b.png"></p>
            <div class="qr_code_pc"><p>Scan to follow</p></div>
        </div>
    </body></html>"#;

    let article = Extractor::builder()
        .profile(wechat_profile())
        .build()
        .extract(&doc(markup))
        .unwrap();

    assert_eq!(article.title(), "港口重新开放");
    assert_eq!(article.metadata().author_name.as_deref(), Some("Port Daily"));
    assert_eq!(article.metadata().publish_time.as_deref(), Some("2024-03-05 14:30:00"));
    assert_eq!(texts(&article), vec!["第一段", "https://mmbiz.qpic.cn/b.png"]);
}

#[test]
fn embedded_script_data_fills_an_empty_page() {
    let markup = r#"<html><head><title>ignored</title></head><body>
        <div id="js_content" style="visibility: hidden"></div>
        <script>
            window.cgiDataNew = {
                title: JsDecode('Harbour \x26 Docks'),
                nick_name: JsDecode('Port Daily'),
                create_time: '1709649000' * 1,
                desc: JsDecode('First line\x0aSecond line'),
                picture_page_info_list: [
                    {cdn_url: JsDecode('https://mmbiz.qpic.cn/a.jpg?wx_fmt=jpeg\x26amp;from=appmsg')},
                ],
            };
        </script>
    </body></html>"#;

    let article = Extractor::builder()
        .profile(wechat_profile())
        .build()
        .extract(&doc(markup))
        .unwrap();

    assert_eq!(article.title(), "Harbour & Docks");
    assert_eq!(article.metadata().author_name.as_deref(), Some("Port Daily"));
    assert_eq!(article.metadata().publish_time.as_deref(), Some("2024-03-05 14:30:00"));
    assert_eq!(
        texts(&article),
        vec![
            "https://mmbiz.qpic.cn/a.jpg?wx_fmt=jpeg&from=appmsg",
            "First line",
            "Second line",
        ]
    );
}

#[test]
fn visible_content_wins_over_embedded_content() {
    let markup = r#"<html><body>
        <h1 id="activity-name">Visible title</h1>
        <div id="js_content"><p>Visible body</p></div>
        <script>window.cgiDataNew = {title: 'Script title', desc: 'Script body'};</script>
    </body></html>"#;

    let article = Extractor::builder()
        .profile(wechat_profile())
        .build()
        .extract(&doc(markup))
        .unwrap();

    assert_eq!(article.title(), "Script title");
    assert_eq!(texts(&article), vec!["Visible body"]);
}

#[test]
fn broken_embedded_data_is_a_recovery_error() {
    let markup = r#"<html><body>
        <article><h1>T</h1><p>Body</p></article>
        <script>window.cgiDataNew = {create_time: '1.2.3' * 1};</script>
    </body></html>"#;

    let err = Extractor::builder()
        .embedded(EmbeddedDataHint::new("window.cgiDataNew"))
        .build()
        .extract(&doc(markup))
        .unwrap_err();

    match err {
        ExtractError::Recovery(e) => assert_eq!(e.stage, RecoveryStage::Coerce),
        other => panic!("expected recovery error, got {other:?}"),
    }
}

#[test]
fn custom_element_content_root() {
    let mut profile = SiteProfile::new("custom");
    profile.content_root = vec![ExtractionStrategy::css("story-body")].into();
    let markup = "<html><body><h1>T</h1><story-body><p>Body text</p></story-body></body></html>";

    let article = Extractor::builder()
        .profile(profile)
        .build()
        .extract(&doc(markup))
        .unwrap();
    assert_eq!(texts(&article), vec!["Body text"]);
}

#[test]
fn missing_content_root_is_no_match() {
    let markup = "<html><body><h1>Title</h1><p>Loose paragraph</p></body></html>";
    let err = Extractor::default().extract(&doc(markup)).unwrap_err();
    assert_eq!(
        err,
        ExtractError::NoMatch {
            slot: Slot::ContentRoot
        }
    );
}

#[test]
fn non_markup_is_malformed_input() {
    let err = Extractor::default().extract(&doc("plain words only")).unwrap_err();
    assert!(err.is_malformed_input());
}

#[test]
fn title_placeholder_only_when_configured() {
    let markup = "<html><body><article><p>Body without a heading</p></article></body></html>";

    let err = Extractor::default().extract(&doc(markup)).unwrap_err();
    assert_eq!(err, ExtractError::NoMatch { slot: Slot::Title });

    let err = Extractor::builder()
        .title_placeholder("  ")
        .build()
        .extract(&doc(markup))
        .unwrap_err();
    assert_eq!(err, ExtractError::NoMatch { slot: Slot::Title });

    let article = Extractor::builder()
        .title_placeholder("Untitled")
        .build()
        .extract(&doc(markup))
        .unwrap();
    assert_eq!(article.title(), "Untitled");
}

#[test]
fn empty_content_root_is_a_validation_error() {
    let markup = "<html><body><h1>T</h1><article>   </article></body></html>";
    let err = Extractor::default().extract(&doc(markup)).unwrap_err();
    assert_eq!(err, ExtractError::Validation(ValidationError::EmptyContent));
}

#[test]
fn first_matching_strategy_wins_and_invalid_ones_are_skipped() {
    let mut profile = SiteProfile::new("ordered");
    profile.title = vec![
        ExtractionStrategy::xpath("//h1["),
        ExtractionStrategy::css("h1.primary"),
        ExtractionStrategy::css("h1"),
    ]
    .into();
    let markup = r#"<html><body><article>
        <h1>Secondary</h1><h1 class="primary">Primary</h1><p>Body</p>
    </article></body></html>"#;

    let article = Extractor::builder()
        .profile(profile)
        .build()
        .extract(&doc(markup))
        .unwrap();
    assert_eq!(article.title(), "Primary");
}

#[test]
fn profile_falls_back_to_generic_lists() {
    let mut profile = SiteProfile::new("sparse");
    profile.title = vec![ExtractionStrategy::css(".does-not-exist")].into();
    let markup = "<html><body><article><h1>Generic title</h1><p>Body</p></article></body></html>";

    let article = Extractor::builder()
        .profile(profile)
        .build()
        .extract(&doc(markup))
        .unwrap();
    assert_eq!(article.title(), "Generic title");
}

#[test]
fn id_comes_from_source_url() {
    let url = Url::parse("https://news.example.com/2024/03/harbour.html").unwrap();
    let first = doc("<article><h1>One</h1><p>A</p></article>").with_source_url(url.clone());
    let second = doc("<article><h1>Two</h1><p>B</p></article>").with_source_url(url);

    let extractor = Extractor::default();
    let a = extractor.extract(&first).unwrap();
    let b = extractor.extract(&second).unwrap();

    assert_eq!(a.id(), b.id());
    assert_eq!(a.source_url(), Some("https://news.example.com/2024/03/harbour.html"));
}

#[test]
fn relative_urls_resolve_against_source_url() {
    let url = Url::parse("https://news.example.com/2024/03/harbour.html").unwrap();
    let document = doc(r#"<article><h1>T</h1><img src="photos/a.jpg"></article>"#).with_source_url(url);

    let article = Extractor::default().extract(&document).unwrap();
    assert_eq!(article.images(), ["https://news.example.com/2024/03/photos/a.jpg"]);
}

#[test]
fn repeated_extraction_is_identical() {
    let markup = r#"<article><h1>T</h1><p>A <img src="/a.png"></p><ol><li>x</li></ol></article>"#;
    let extractor = Extractor::default();
    let document = doc(markup);

    let first = extractor.extract(&document).unwrap();
    let second = extractor.extract(&document).unwrap();
    assert_eq!(first, second);
}

#[test]
fn one_extractor_serves_many_threads() {
    let extractor = Extractor::builder().profile(wechat_profile()).build();
    let documents: Vec<SourceDocument> = (0..8)
        .map(|i| {
            doc(&format!(
                r#"<h1 id="activity-name">Story {i}</h1><div id="js_content"><p>Body {i}</p></div>"#
            ))
        })
        .collect();

    let extractor = &extractor;
    let titles: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = documents
            .iter()
            .map(|document| scope.spawn(move || extractor.extract(document).map(|a| a.title().to_string())))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    let expected: Vec<String> = (0..8).map(|i| format!("Story {i}")).collect();
    assert_eq!(titles, expected);
}

#[test]
fn decodes_bytes_before_extracting() {
    let (bytes, _, _) = encoding_rs::GBK.encode("<article><h1>港口新闻</h1><p>船只返回</p></article>");
    let document = SourceDocument::from_bytes(&bytes, Some("text/html; charset=gbk"), origin());

    let article = Extractor::default().extract(&document).unwrap();
    assert_eq!(article.title(), "港口新闻");
    assert_eq!(article.plain_text(), "港口新闻\n\n船只返回");
}

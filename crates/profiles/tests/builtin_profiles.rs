// ABOUTME: Integration tests running built-in site profiles through the extraction engine.
// ABOUTME: Uses small inline pages shaped like the sites each profile targets.

use newsloom_engine::{Extractor, SourceDocument};
use newsloom_profiles::load_builtin_registry;
use pretty_assertions::assert_eq;
use url::Url;

fn extract(url: &str, markup: &str) -> newsloom_engine::Article {
    let url = Url::parse(url).unwrap();
    let registry = load_builtin_registry().unwrap();
    let profile = registry.for_url(&url).expect("profile for url");
    let origin = Url::parse(&url.origin().ascii_serialization()).unwrap();
    let document = SourceDocument::new(markup, origin).with_source_url(url);
    Extractor::builder()
        .profile(profile)
        .build()
        .extract(&document)
        .unwrap()
}

#[test]
fn wechat_page_with_visible_content() {
    let article = extract(
        "https://mp.weixin.qq.com/s/abc",
        r#"<html><body>
            <h1 class="rich_media_title" id="activity-name">  港口重新开放 </h1>
            <div id="profileBt"><a id="js_name"> 港口日报 </a></div>
            <em id="publish_time">2024-03-05 14:30</em>
            <div id="js_content">
                <section><p>船只周一返回。</p></section>
                <p><img data-src="https://mmbiz.qpic.cn/a.jpg"></p>
            </div>
            <div id="js_pc_qr_code"><p>扫码关注</p></div>
        </body></html>"#,
    );

    assert_eq!(article.title(), "港口重新开放");
    assert_eq!(article.metadata().author_name.as_deref(), Some("港口日报"));
    assert_eq!(article.metadata().publish_time.as_deref(), Some("2024-03-05 14:30:00"));
    assert_eq!(article.plain_text(), "船只周一返回。");
    assert_eq!(article.images(), ["https://mmbiz.qpic.cn/a.jpg"]);
    assert_eq!(article.source_url(), Some("https://mp.weixin.qq.com/s/abc"));
}

#[test]
fn wechat_picture_post_from_script_data() {
    let article = extract(
        "https://mp.weixin.qq.com/s/pics",
        r#"<html><body>
            <div id="js_content"></div>
            <script>
                window.cgiDataNew = {
                    title: JsDecode('Harbour at dawn'),
                    nick_name: JsDecode('Port Daily'),
                    ori_send_time: '1709649000' * 1,
                    picture_page_info_list: [
                        {cdn_url: JsDecode('https://mmbiz.qpic.cn/1.jpg')},
                        {cdn_url: JsDecode('https://mmbiz.qpic.cn/2.jpg')},
                    ],
                };
            </script>
        </body></html>"#,
    );

    assert_eq!(article.title(), "Harbour at dawn");
    assert_eq!(article.metadata().publish_time.as_deref(), Some("2024-03-05 14:30:00"));
    assert_eq!(
        article.images(),
        ["https://mmbiz.qpic.cn/1.jpg", "https://mmbiz.qpic.cn/2.jpg"]
    );
    assert_eq!(article.plain_text(), "Harbour at dawn");
}

#[test]
fn cnn_page_uses_profile_selectors() {
    let article = extract(
        "https://www.cnn.com/2024/03/05/world/harbour/index.html",
        r#"<html><body>
            <h1 class="headline__text">Harbour reopens</h1>
            <span class="byline__name">Mara Ortiz</span>
            <div class="timestamp">Updated 2024-03-05 06:30</div>
            <div class="article__content">
                <p>Ships returned on Monday.</p>
                <div class="related-content"><p>Read more</p></div>
            </div>
        </body></html>"#,
    );

    assert_eq!(article.title(), "Harbour reopens");
    assert_eq!(article.metadata().author_name.as_deref(), Some("Mara Ortiz"));
    assert_eq!(article.plain_text(), "Ships returned on Monday.");
}

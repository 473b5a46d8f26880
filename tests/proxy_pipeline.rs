//! End-to-end tests: real listener, real upstream client, mock target.

use std::time::Duration;

use cors_proxy::config::ProxyConfig;

mod common;
use common::MockReply;

fn config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config
}

#[tokio::test]
async fn test_html_references_routed_through_proxy() {
    let (target, _) = common::start_programmable_backend(|_| {
        MockReply::ok(
            Some("text/html; charset=utf-8"),
            r##"<html><img src="/logo.png"><a href="#top">top</a></html>"##,
        )
    })
    .await;
    let (proxy, shutdown, _) = common::start_proxy(config()).await;

    let res = common::client()
        .get(format!("http://{}/?url=http://{}/page", proxy, target))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert_eq!(res.headers()["content-type"], "text/html; charset=utf-8");
    let body = res.text().await.unwrap();
    assert_eq!(
        body,
        format!(
            r##"<html><img src="http://{}/?url=http%3A%2F%2F{}%2Flogo.png"><a href="#top">top</a></html>"##,
            proxy,
            target.to_string().replace(':', "%3A")
        )
    );

    shutdown.trigger();
}

#[tokio::test]
async fn test_css_rewritten_against_public_base_url() {
    let (target, _) = common::start_programmable_backend(|_| {
        MockReply::ok(Some("text/css"), "@font-face { src: url('../fonts/a.woff2'); }")
    })
    .await;
    let mut config = config();
    config.listener.public_base_url = Some("https://proxy.example.com".into());
    let (proxy, shutdown, _) = common::start_proxy(config).await;

    let res = common::client()
        .get(format!("http://{}/?url=http%3A%2F%2F{}%2Fcss%2Fapp.css", proxy, target))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body = res.text().await.unwrap();
    assert_eq!(
        body,
        format!(
            r#"@font-face {{ src: url("https://proxy.example.com/?url=http%3A%2F%2F{}%2Ffonts%2Fa.woff2"); }}"#,
            target.to_string().replace(':', "%3A")
        )
    );

    shutdown.trigger();
}

#[tokio::test]
async fn test_request_headers_and_body_forwarded() {
    let (target, recorded) = common::start_programmable_backend(|_| {
        MockReply::ok(Some("application/json"), "{}")
            .header("Access-Control-Allow-Origin", "https://only.example")
            .header("X-Upstream", "yes")
    })
    .await;
    let (proxy, shutdown, _) = common::start_proxy(config()).await;

    let res = common::client()
        .post(format!("http://{}/?url=http://{}/submit", proxy, target))
        .header("Origin", "https://app.example")
        .header("X-Api-Key", "secret")
        .body("hello")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert_eq!(res.headers()["access-control-expose-headers"], "*");
    assert_eq!(res.headers()["x-upstream"], "yes");
    assert!(res.headers().contains_key("x-request-id"));

    let seen = recorded.lock().unwrap()[0].clone();
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.target, "/submit");
    assert_eq!(seen.body, b"hello");
    assert_eq!(seen.header("host"), Some(target.to_string().as_str()));
    assert_eq!(seen.header("origin"), None);
    assert_eq!(seen.header("x-api-key"), Some("secret"));
    assert!(seen.header("user-agent").unwrap().starts_with("Mozilla/5.0"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_forced_get_drops_method_and_body() {
    let (target, recorded) =
        common::start_programmable_backend(|_| MockReply::ok(Some("text/plain"), "ok")).await;
    let mut config = config();
    config.upstream.forward_method = false;
    let (proxy, shutdown, _) = common::start_proxy(config).await;

    let res = common::client()
        .put(format!("http://{}/?url=http://{}/thing", proxy, target))
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let seen = recorded.lock().unwrap()[0].clone();
    assert_eq!(seen.method, "GET");
    assert!(seen.body.is_empty());

    shutdown.trigger();
}

#[tokio::test]
async fn test_path_style_target() {
    let (target, recorded) =
        common::start_programmable_backend(|_| MockReply::ok(Some("text/plain"), "path")).await;
    let (proxy, shutdown, _) = common::start_proxy(config()).await;

    let res = common::client()
        .get(format!("http://{}/http://{}/page?x=1", proxy, target))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "path");
    assert_eq!(recorded.lock().unwrap()[0].target, "/page?x=1");

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_status_passed_through() {
    let (target, _) = common::start_programmable_backend(|_| {
        MockReply::ok(Some("text/plain"), "gone").status(404)
    })
    .await;
    let (proxy, shutdown, _) = common::start_proxy(config()).await;

    let res = common::client()
        .get(format!("http://{}/?url=http://{}/missing", proxy, target))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 404);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    assert_eq!(res.text().await.unwrap(), "gone");

    shutdown.trigger();
}

#[tokio::test]
async fn test_content_type_from_extension_drives_rewrite() {
    let (target, _) = common::start_programmable_backend(|_| {
        MockReply::ok(None, "<html>body{background:url(bg.png)}")
    })
    .await;
    let (proxy, shutdown, _) = common::start_proxy(config()).await;

    let res = common::client()
        .get(format!("http://{}/?url=http://{}/static/site.css", proxy, target))
        .send()
        .await
        .unwrap();

    assert_eq!(res.headers()["content-type"], "text/css");
    let body = res.text().await.unwrap();
    assert!(body.starts_with(&format!("<html>body{{background:url(\"http://{}/?url=", proxy)));
    assert!(body.ends_with("%2Fstatic%2Fbg.png\")}"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_binary_body_untouched() {
    let png = b"\x89PNG\r\n\x1a\n\x00\x00src=\"a\"".to_vec();
    let expected = png.clone();
    let (target, _) =
        common::start_programmable_backend(move |_| MockReply::ok(None, png.clone())).await;
    let (proxy, shutdown, _) = common::start_proxy(config()).await;

    let res = common::client()
        .get(format!("http://{}/?url=http://{}/download", proxy, target))
        .send()
        .await
        .unwrap();

    assert_eq!(res.headers()["content-type"], "image/png");
    assert_eq!(res.bytes().await.unwrap().as_ref(), expected.as_slice());

    shutdown.trigger();
}

#[tokio::test]
async fn test_redirect_followed_and_final_url_is_base() {
    let (target, _) = common::start_programmable_backend(|req| {
        if req.target == "/old" {
            MockReply::ok(None, "").status(302).header("Location", "/new/")
        } else {
            MockReply::ok(Some("text/html"), r#"<a href="next.html">n</a>"#)
        }
    })
    .await;
    let (proxy, shutdown, _) = common::start_proxy(config()).await;

    let res = common::client()
        .get(format!("http://{}/?url=http://{}/old", proxy, target))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body = res.text().await.unwrap();
    assert!(body.contains("%2Fnew%2Fnext.html"), "{body}");

    shutdown.trigger();
}

#[tokio::test]
async fn test_missing_url_is_bad_request() {
    let (proxy, shutdown, _) = common::start_proxy(config()).await;

    let res = common::client().get(format!("http://{}/", proxy)).send().await.unwrap();
    assert_eq!(res.status(), 400);
    assert_eq!(res.headers()["access-control-allow-origin"], "*");

    shutdown.trigger();
}

#[tokio::test]
async fn test_graceful_shutdown_stops_server() {
    let (_, shutdown, handle) = common::start_proxy(config()).await;

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
}

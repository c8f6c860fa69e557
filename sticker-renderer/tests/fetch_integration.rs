//! Integration tests for the HTTP image fetcher and the load chain.

use std::io::Cursor;

use sticker_core::{
    load_image_chain, FetchError, ImageFetcher, ImageLoadConfig, LoadStrategy, NoticeLevel,
    RecordingNotifier,
};
use sticker_renderer::{HttpFetcherConfig, HttpImageFetcher};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([0, 128, 255, 255]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .expect("encode");
    buf.into_inner()
}

fn fetcher() -> HttpImageFetcher {
    HttpImageFetcher::new(HttpFetcherConfig {
        origin: "http://sticker.test".into(),
        authorization: Some("Bearer label-token".into()),
        ..Default::default()
    })
    .expect("client")
}

// ==========================================================================
// Single attempts
// ==========================================================================

#[tokio::test]
async fn test_direct_fetch_decodes_natural_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(png_bytes(40, 20)),
        )
        .mount(&server)
        .await;

    let image = fetcher()
        .fetch(&format!("{}/logo.png", server.uri()), LoadStrategy::Direct)
        .await
        .expect("fetch");
    assert_eq!((image.width, image.height), (40, 20));
    assert_eq!(image.mime, "image/png");
}

#[tokio::test]
async fn test_anonymous_fetch_sends_origin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .and(header("origin", "http://sticker.test"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(2, 2)))
        .expect(1)
        .mount(&server)
        .await;

    fetcher()
        .fetch(&format!("{}/logo.png", server.uri()), LoadStrategy::Anonymous)
        .await
        .expect("fetch");
}

#[tokio::test]
async fn test_credentialed_fetch_sends_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private.png"))
        .and(header("authorization", "Bearer label-token"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(2, 2)))
        .expect(1)
        .mount(&server)
        .await;

    fetcher()
        .fetch(
            &format!("{}/private.png", server.uri()),
            LoadStrategy::Credentialed,
        )
        .await
        .expect("fetch");
}

#[tokio::test]
async fn test_error_status_and_non_image_body() {
    let server = MockServer::start().await;
    Mock::given(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(path("/page.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html></html>"),
        )
        .mount(&server)
        .await;

    let fetcher = fetcher();
    let missing = fetcher
        .fetch(&format!("{}/missing.png", server.uri()), LoadStrategy::Direct)
        .await;
    assert_eq!(missing, Err(FetchError::Status(404)));

    let html = fetcher
        .fetch(&format!("{}/page.html", server.uri()), LoadStrategy::Direct)
        .await;
    assert!(matches!(html, Err(FetchError::Decode(_))));
}

#[tokio::test]
async fn test_data_uri_is_decoded_locally() {
    let uri = format!(
        "data:image/png;base64,{}",
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, png_bytes(3, 5))
    );
    let image = fetcher()
        .fetch(&uri, LoadStrategy::Direct)
        .await
        .expect("data uri");
    assert_eq!((image.width, image.height), (3, 5));
}

#[tokio::test]
async fn test_unsupported_scheme() {
    let result = fetcher()
        .fetch("ftp://example.com/a.png", LoadStrategy::Direct)
        .await;
    assert!(matches!(result, Err(FetchError::Unsupported(_))));
}

#[tokio::test]
async fn test_oversized_body_is_refused() {
    let server = MockServer::start().await;
    Mock::given(path("/huge.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(64, 64)))
        .mount(&server)
        .await;

    let fetcher = HttpImageFetcher::new(HttpFetcherConfig {
        max_bytes: 16,
        ..Default::default()
    })
    .expect("client");
    let result = fetcher
        .fetch(&format!("{}/huge.png", server.uri()), LoadStrategy::Direct)
        .await;
    assert_eq!(result, Err(FetchError::TooLarge { limit: 16 }));

    let uri = format!(
        "data:image/png;base64,{}",
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, png_bytes(64, 64))
    );
    let inline = fetcher.fetch(&uri, LoadStrategy::Direct).await;
    assert_eq!(inline, Err(FetchError::TooLarge { limit: 16 }));
}

// ==========================================================================
// Full chain
// ==========================================================================

#[tokio::test]
async fn test_chain_reaches_proxy_after_three_failures() {
    let server = MockServer::start().await;
    let original = format!("{}/blocked.png", server.uri());

    Mock::given(path("/blocked.png"))
        .respond_with(ResponseTemplate::new(403))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(path("/proxy"))
        .and(query_param("url", original.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(8, 8)))
        .expect(1)
        .mount(&server)
        .await;

    let config =
        ImageLoadConfig::default().with_proxy(format!("{}/proxy?url={{url}}", server.uri()));
    let notifier = RecordingNotifier::new();
    let image = load_image_chain(&fetcher(), &original, &config, &notifier)
        .await
        .expect("proxy succeeds");

    assert_eq!((image.width, image.height), (8, 8));
    assert_eq!(notifier.count(NoticeLevel::Success), 1);
    assert_eq!(notifier.count(NoticeLevel::Error), 0);
}

#[tokio::test]
async fn test_chain_failure_lists_every_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let url = format!("{}/gone.png", server.uri());
    let config =
        ImageLoadConfig::default().with_proxy(format!("{}/proxy?url={{url}}", server.uri()));
    let notifier = RecordingNotifier::new();
    let failure = load_image_chain(&fetcher(), &url, &config, &notifier)
        .await
        .expect_err("all attempts fail");

    let strategies: Vec<_> = failure.attempts.iter().map(|(s, _)| *s).collect();
    assert_eq!(strategies, LoadStrategy::CHAIN.to_vec());
    assert!(failure
        .attempts
        .iter()
        .all(|(_, e)| *e == FetchError::Status(500)));
    assert_eq!(notifier.count(NoticeLevel::Error), 1);
}

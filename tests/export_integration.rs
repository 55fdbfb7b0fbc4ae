//! End-to-end exports through the built-in rasterizer.

use std::io::Cursor;
use std::sync::Once;
use std::time::{Duration, Instant};

use base64::Engine as _;
use image::{DynamicImage, ImageFormat, RgbaImage};
use sha2::{Digest, Sha256};
use stage_export::export::readiness::wait_for_images;
use stage_export::export::watermark::WATERMARK_ID;
use stage_export::{
    Document, ExportConfig, ExportFormat, ExportOptions, ExportResult, Exporter, WatermarkConfig, EXPORT_TARGET_ID,
};
use tiny_http::{Response, Server};

static INIT: Once = Once::new();
static STALL_INIT: Once = Once::new();

fn start_image_server() -> String {
    INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18093").unwrap();
            for request in server.incoming_requests() {
                let _ = request.respond(Response::from_string("Not Found").with_status_code(404));
            }
        });
        std::thread::sleep(Duration::from_millis(100));
    });

    "http://127.0.0.1:18093".to_string()
}

/// Accepts image requests and never answers them.
fn start_stalling_server() -> String {
    STALL_INIT.call_once(|| {
        std::thread::spawn(|| {
            let server = Server::http("127.0.0.1:18094").unwrap();
            let mut held = Vec::new();
            for request in server.incoming_requests() {
                held.push(request);
            }
        });
        std::thread::sleep(Duration::from_millis(100));
    });

    "http://127.0.0.1:18094".to_string()
}

fn png_data_url(width: u32, height: u32, rgba: [u8; 4]) -> String {
    let img = RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes.into_inner())
    )
}

fn scene(image_src: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><style>
  :root {{ --frame: oklch(0.628 0.2577 29.23); }}
  #image-render-card {{ width: 50vw; height: 40vh; background: #202020; overflow: hidden; }}
</style></head>
<body>
  <div id="image-render-card">
    <img id="shot" src="{image_src}" style="display: block; width: 400px; height: 300px">
  </div>
</body>
</html>"#
    )
}

fn exporter() -> Exporter {
    Exporter::new(ExportConfig {
        settle_delay_ms: 0,
        watermark_delay_ms: 0,
        ..Default::default()
    })
}

fn options(format: ExportFormat) -> ExportOptions {
    ExportOptions {
        format,
        quality: 1.0,
        scale: 2.0,
        export_width: 800,
        export_height: 600,
    }
}

async fn export(markup: &str, opts: &ExportOptions) -> ExportResult {
    let mut doc = Document::parse_html(markup, None).unwrap();
    exporter()
        .export_element(&mut doc, EXPORT_TARGET_ID, opts)
        .await
        .expect("export")
}

fn decode_data_url(url: &str) -> DynamicImage {
    let (_, payload) = url.split_once(";base64,").expect("base64 data URL");
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload).unwrap();
    image::load_from_memory(&bytes).unwrap()
}

fn pixel_digest(img: &DynamicImage) -> String {
    hex::encode(Sha256::digest(img.to_rgba8().as_raw()))
}

#[tokio::test]
async fn data_url_prefix_follows_format() {
    let markup = scene(&png_data_url(8, 8, [255, 0, 0, 255]));
    let png = export(&markup, &options(ExportFormat::Png)).await;
    assert!(png.data_url.starts_with("data:image/png"));
    assert_eq!(png.blob.mime_type(), "image/png");

    let jpg = export(&markup, &ExportOptions { quality: 0.8, ..options(ExportFormat::Jpg) }).await;
    assert!(jpg.data_url.starts_with("data:image/jpeg"));
    assert_eq!(jpg.blob.mime_type(), "image/jpeg");
}

#[tokio::test]
async fn exports_800x600_at_2x_with_image_and_watermark() {
    let markup = scene(&png_data_url(40, 30, [255, 0, 0, 255]));
    let result = export(&markup, &options(ExportFormat::Png)).await;
    let img = decode_data_url(&result.data_url).to_rgba8();
    assert_eq!(img.dimensions(), (1600, 1200));

    // The uploaded image, scaled into its 400x300 box.
    assert_eq!(img.get_pixel(200, 200).0, [255, 0, 0, 255]);
    assert_eq!(img.get_pixel(790, 590).0, [255, 0, 0, 255]);
    // Card background outside it.
    assert_eq!(img.get_pixel(1000, 300).0, [32, 32, 32, 255]);

    // Translucent white glyphs near the bottom-right corner.
    let bright = (1000..1200)
        .flat_map(|y| (1200..1600).map(move |x| (x, y)))
        .filter(|&(x, y)| {
            let p = img.get_pixel(x, y).0;
            p[0] > 150 && p[1] > 150 && p[2] > 150
        })
        .count();
    assert!(bright > 50, "expected a watermark cluster, found {bright} bright pixels");
    let top_left_bright = (0..200)
        .flat_map(|y| (1200..1600).map(move |x| (x, y)))
        .any(|(x, y)| img.get_pixel(x, y).0[1] > 150);
    assert!(!top_left_bright);
}

#[tokio::test]
async fn blob_and_data_url_decode_identically() {
    let markup = scene(&png_data_url(16, 16, [0, 128, 255, 255]));
    for format in [ExportFormat::Png, ExportFormat::Jpg] {
        let result = export(&markup, &options(format)).await;
        let from_blob = image::load_from_memory(result.blob.bytes()).unwrap();
        let from_url = decode_data_url(&result.data_url);
        assert_eq!(pixel_digest(&from_blob), pixel_digest(&from_url));
    }
}

#[tokio::test]
async fn repeated_exports_are_identical() {
    let markup = scene(&png_data_url(16, 16, [10, 200, 30, 255]));
    let mut doc = Document::parse_html(&markup, None).unwrap();
    let opts = options(ExportFormat::Png);
    let exporter = exporter();
    let first = exporter.export_element(&mut doc, EXPORT_TARGET_ID, &opts).await.unwrap();
    let second = exporter.export_element(&mut doc, EXPORT_TARGET_ID, &opts).await.unwrap();
    let (a, b) = (decode_data_url(&first.data_url), decode_data_url(&second.data_url));
    assert_eq!((a.width(), a.height()), (b.width(), b.height()));
    assert_eq!(pixel_digest(&a), pixel_digest(&b));
    assert_eq!(first.blob, second.blob);
}

#[tokio::test]
async fn missing_target_is_not_found() {
    let mut doc = Document::parse_html(&scene("data:,"), None).unwrap();
    let err = exporter()
        .export_element(&mut doc, "no-such-card", &options(ExportFormat::Png))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not found"));
    assert!(doc.get_element_by_id(WATERMARK_ID).is_none());
}

#[tokio::test]
async fn broken_image_does_not_block_export() {
    let base = start_image_server();
    let markup = scene(&format!("{base}/missing.png"));
    let started = Instant::now();
    let result = export(&markup, &options(ExportFormat::Png)).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    let img = decode_data_url(&result.data_url).to_rgba8();
    assert_eq!(img.dimensions(), (1600, 1200));
    // Nothing painted where the image would be.
    assert_eq!(img.get_pixel(200, 200).0, [32, 32, 32, 255]);
}

#[tokio::test]
async fn gate_without_images_returns_at_once() {
    let doc = Document::parse_html(
        r#"<div id="image-render-card"><p>only text</p><svg><rect width="4" height="4"/></svg></div>"#,
        None,
    )
    .unwrap();
    let card = doc.get_element_by_id(EXPORT_TARGET_ID).unwrap();
    let started = Instant::now();
    let report = wait_for_images(&doc, card, Duration::from_secs(10)).await;
    assert_eq!(report.total, 0);
    assert!(started.elapsed() < Duration::from_millis(50));
}

#[tokio::test]
async fn modern_colors_render_after_normalization() {
    let markup = r#"<html><head><style>
        :root { --accent: oklch(0.628 0.2577 29.23); }
      </style></head><body>
        <div id="image-render-card" style="background-color: var(--accent)">
          <div id="swatch" style="width: 100px; height: 100px; background: oklch(0.8664 0.2948 142.5)"></div>
        </div>
      </body></html>"#;
    let mut doc = Document::parse_html(markup, None).unwrap();
    let opts = ExportOptions {
        scale: 1.0,
        export_width: 300,
        export_height: 200,
        ..options(ExportFormat::Png)
    };
    let result = exporter().export_element(&mut doc, EXPORT_TARGET_ID, &opts).await.unwrap();
    let img = decode_data_url(&result.data_url).to_rgba8();

    let card = img.get_pixel(250, 20).0;
    assert!(card[0] > 200 && card[1] < 80 && card[2] < 80, "card pixel {card:?}");
    let swatch = img.get_pixel(50, 50).0;
    assert!(swatch[1] > 200 && swatch[0] < 80, "swatch pixel {swatch:?}");

    // The live document keeps its declarations.
    let swatch_id = doc.get_element_by_id("swatch").unwrap();
    assert!(doc.element(swatch_id).unwrap().style().value("background").unwrap().contains("oklch"));
}

#[tokio::test]
async fn gate_gives_up_on_stalled_images() {
    let base = start_stalling_server();
    let doc = Document::parse_html(&scene(&format!("{base}/slow.png")), None).unwrap();
    let card = doc.get_element_by_id(EXPORT_TARGET_ID).unwrap();
    let started = Instant::now();
    let report = wait_for_images(&doc, card, Duration::from_millis(200)).await;
    let elapsed = started.elapsed();
    assert_eq!(report.total, 1);
    assert_eq!(report.pending, 1);
    assert!(!report.is_complete());
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_secs(3));
}

#[tokio::test]
async fn export_proceeds_past_stalled_images() {
    let base = start_stalling_server();
    let mut doc = Document::parse_html(&scene(&format!("{base}/stuck.png")), None).unwrap();
    let exporter = Exporter::new(ExportConfig {
        settle_delay_ms: 0,
        watermark_delay_ms: 0,
        image_timeout_ms: 200,
        raster_image_timeout_ms: 200,
        ..Default::default()
    });
    let started = Instant::now();
    let result = exporter
        .export_element(&mut doc, EXPORT_TARGET_ID, &options(ExportFormat::Png))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
    let img = decode_data_url(&result.data_url).to_rgba8();
    assert_eq!(img.dimensions(), (1600, 1200));
    assert_eq!(img.get_pixel(200, 200).0, [32, 32, 32, 255]);
}

#[tokio::test]
async fn unpaintable_canvas_watermark_does_not_fail_export() {
    let markup = scene(&png_data_url(8, 8, [255, 0, 0, 255]));
    let mut doc = Document::parse_html(&markup, None).unwrap();
    let exporter = Exporter::new(ExportConfig {
        settle_delay_ms: 0,
        watermark_delay_ms: 0,
        watermark: WatermarkConfig {
            text_color: "oklch(0.628 0.2577 29.23)".into(),
            ..Default::default()
        },
        ..Default::default()
    });
    let result = exporter
        .export_element(&mut doc, EXPORT_TARGET_ID, &ExportOptions { quality: 0.8, ..options(ExportFormat::Jpg) })
        .await
        .unwrap();
    assert!(result.data_url.starts_with("data:image/jpeg;base64,"));
    assert!(doc.get_element_by_id(WATERMARK_ID).is_none());
}

#[tokio::test]
async fn border_shorthands_with_modern_colors_render() {
    let markup = r#"<html><head><style>
        :root { --edge: oklch(0.628 0.2577 29.23); }
        #image-render-card { background: #202020; }
      </style></head><body>
        <div id="image-render-card">
          <div style="width: 100px; height: 100px; border: 10px solid var(--edge)"></div>
          <div style="width: 100px; height: 100px; border-top: 10px solid oklch(0.628 0.2577 29.23)"></div>
        </div>
      </body></html>"#;
    let mut doc = Document::parse_html(markup, None).unwrap();
    let opts = ExportOptions {
        scale: 1.0,
        export_width: 300,
        export_height: 300,
        ..options(ExportFormat::Png)
    };
    let result = exporter().export_element(&mut doc, EXPORT_TARGET_ID, &opts).await.unwrap();
    let img = decode_data_url(&result.data_url).to_rgba8();

    // Left edge of the full border, then the top edge of the second box.
    assert_eq!(img.get_pixel(3, 50).0, [255, 0, 0, 255]);
    assert_eq!(img.get_pixel(50, 123).0, [255, 0, 0, 255]);
    // Inside the first box.
    assert_eq!(img.get_pixel(60, 60).0, [32, 32, 32, 255]);
}

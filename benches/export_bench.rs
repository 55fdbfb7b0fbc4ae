use criterion::{criterion_group, criterion_main, Criterion};

use stage_export::dom::Document;
use stage_export::export::normalize;
use stage_export::{ExportConfig, ExportFormat, ExportOptions, Exporter, EXPORT_TARGET_ID};

const SCENE: &str = r#"<html><head><style>
  :root { --accent: oklch(0.7 0.15 250); --ink: oklch(0.2 0.02 260); }
  .title { color: var(--ink); font-size: 32px; }
</style></head><body>
  <div id="image-render-card" style="background: linear-gradient(135deg, #1e3a8a, #9333ea); padding: 40px; display: flex; flex-direction: column; gap: 16px">
    <div class="title">Release notes</div>
    <div style="flex-grow: 1; border-radius: 16px; border: 4px solid var(--accent); box-shadow: 0 8px 0 rgba(0, 0, 0, 0.3); background-color: #f8fafc"></div>
    <svg viewBox="0 0 10 10" style="width: 40px; height: 40px"><circle cx="5" cy="5" r="4" fill="var(--accent)"/></svg>
  </div>
</body></html>"#;

fn bench_export(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("failed to create runtime");
    let exporter = Exporter::new(ExportConfig {
        settle_delay_ms: 0,
        watermark_delay_ms: 0,
        ..Default::default()
    });
    let options = ExportOptions {
        format: ExportFormat::Png,
        quality: 1.0,
        scale: 1.0,
        export_width: 640,
        export_height: 360,
    };
    let mut doc = Document::parse_html(SCENE, None).expect("scene parses");

    c.bench_function("export_png_640x360", |b| {
        b.iter(|| {
            runtime
                .block_on(exporter.export_element(&mut doc, EXPORT_TARGET_ID, &options))
                .unwrap()
        })
    });
}

fn bench_normalize(c: &mut Criterion) {
    let doc = Document::parse_html(SCENE, None).expect("scene parses");
    let card = doc.get_element_by_id(EXPORT_TARGET_ID).expect("card");

    c.bench_function("normalize_snapshot", |b| {
        b.iter(|| {
            let mut clone = doc.clone();
            normalize::inject_rgb_overrides(&mut clone);
            for node in clone.descendant_elements(card) {
                normalize::convert_styles_to_rgb(&mut clone, node);
            }
        })
    });
}

criterion_group!(benches, bench_export, bench_normalize);
criterion_main!(benches);

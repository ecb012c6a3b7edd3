mod support;

use checkin_report::layout::footer_text;
use checkin_report::{ReportError, ReportSettings, SkipReason};
use support::{
    driver, file_count, image_sizes, image_xobject_count, normalized_hash, page_count,
    page_image_sizes, renderer, settings, skip_without_fonts, FailingSink, PhotoHost,
    SharedBuffer,
};

#[tokio::test]
async fn missing_record_writes_nothing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let renderer = renderer(vec![driver(1)], settings(temp.path()));
    let sink = SharedBuffer::default();

    let err = renderer
        .render(404, sink.clone())
        .await
        .expect_err("record 404 does not exist");

    assert!(matches!(err, ReportError::NotFound { id: 404 }));
    assert!(sink.bytes().is_empty());
    assert_eq!(file_count(temp.path()), 0);
}

#[tokio::test]
async fn record_without_photos_renders_a_single_page_without_images() {
    if skip_without_fonts("record_without_photos_renders_a_single_page_without_images") {
        return;
    }
    let temp = tempfile::tempdir().expect("tempdir");
    let renderer = renderer(vec![driver(1)], settings(temp.path()));
    let sink = SharedBuffer::default();

    let summary = renderer.render(1, sink.clone()).await.expect("render");

    let pdf = sink.bytes();
    assert!(pdf.starts_with(b"%PDF"));
    assert_eq!(summary.bytes_written as usize, pdf.len());
    assert_eq!(summary.page_count, 1);
    assert_eq!(page_count(&pdf), 1);
    assert!(summary.placements.is_empty());
    assert_eq!(image_xobject_count(&pdf), 0);
    assert_eq!(summary.footers, vec![footer_text(1, 1)]);
}

#[tokio::test]
async fn only_fetchable_photos_are_placed_in_record_order() {
    if skip_without_fonts("only_fetchable_photos_are_placed_in_record_order") {
        return;
    }
    let host = PhotoHost::start().await;
    let names = [
        "a.png",
        "wide-b.png",
        "missing.png",
        "tall-c.png",
        "d.png",
        "wide-e.png",
        "f.png",
    ];
    let record = driver(2).with_photos(names.iter().map(|name| host.photo(name)));
    let temp = tempfile::tempdir().expect("tempdir");
    let renderer = renderer(vec![record], settings(temp.path()));
    let sink = SharedBuffer::default();

    let summary = renderer.render(2, sink.clone()).await.expect("render");

    let expected: Vec<String> = names
        .iter()
        .filter(|name| **name != "missing.png")
        .map(|name| host.url(name))
        .collect();
    let placed: Vec<String> = summary.placements.iter().map(|p| p.source.clone()).collect();
    assert_eq!(placed, expected);

    let cells: Vec<(usize, usize)> = summary
        .placements
        .iter()
        .map(|p| (p.row, p.column))
        .collect();
    assert_eq!(cells, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);

    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].index, 2);
    assert!(matches!(summary.skipped[0].reason, SkipReason::Fetch(_)));
    assert_eq!(image_xobject_count(&sink.bytes()), 6);
}

#[tokio::test]
async fn placed_photos_fit_inside_their_cells() {
    if skip_without_fonts("placed_photos_fit_inside_their_cells") {
        return;
    }
    let host = PhotoHost::start().await;
    let record = driver(3).with_photos(["wide-1.png", "tall-2.png"].map(|n| host.photo(n)));
    let temp = tempfile::tempdir().expect("tempdir");
    let renderer = renderer(vec![record], settings(temp.path()));

    let summary = renderer
        .render(3, SharedBuffer::default())
        .await
        .expect("render");

    let wide = &summary.placements[0];
    let tall = &summary.placements[1];
    assert!((wide.width_mm / wide.height_mm - 3.0).abs() < 1e-6);
    assert!((tall.height_mm / tall.width_mm - 3.0).abs() < 1e-6);
    assert!(tall.x_mm > wide.x_mm + wide.width_mm);
    assert!(wide.y_mm > tall.y_mm, "wide photo is centred vertically");
}

#[tokio::test]
async fn footers_number_every_page_with_the_final_count() {
    if skip_without_fonts("footers_number_every_page_with_the_final_count") {
        return;
    }
    let host = PhotoHost::start().await;
    let record = driver(4).with_photos((0..12).map(|i| host.photo(&format!("p{}.png", i))));
    let temp = tempfile::tempdir().expect("tempdir");
    let renderer = renderer(
        vec![record],
        ReportSettings {
            max_photos: 12,
            ..settings(temp.path())
        },
    );
    let sink = SharedBuffer::default();

    let summary = renderer.render(4, sink.clone()).await.expect("render");

    let pages = page_count(&sink.bytes());
    assert!(pages >= 2, "twelve photos need more than one page");
    assert_eq!(summary.page_count, pages);
    let expected: Vec<String> = (1..=pages).map(|page| footer_text(page, pages)).collect();
    assert_eq!(summary.footers, expected);

    assert_eq!(summary.placements.len(), 12);
    let last = summary.placements.last().expect("placements");
    assert!(last.page > 1);
    assert!(summary
        .placements
        .windows(2)
        .all(|pair| pair[0].page <= pair[1].page));
}

#[tokio::test]
async fn temporary_assets_are_removed_after_success() {
    if skip_without_fonts("temporary_assets_are_removed_after_success") {
        return;
    }
    let host = PhotoHost::start().await;
    let record = driver(5).with_photos(["a.png", "b.png", "broken.png"].map(|n| host.photo(n)));
    let temp = tempfile::tempdir().expect("tempdir");
    let renderer = renderer(vec![record], settings(temp.path()));

    let summary = renderer
        .render(5, SharedBuffer::default())
        .await
        .expect("render");

    assert_eq!(summary.placements.len(), 2);
    assert!(matches!(summary.skipped[0].reason, SkipReason::Decode(_)));
    assert_eq!(file_count(temp.path()), 0);
}

#[tokio::test]
async fn sink_failure_aborts_and_still_cleans_up() {
    if skip_without_fonts("sink_failure_aborts_and_still_cleans_up") {
        return;
    }
    let host = PhotoHost::start().await;
    let record = driver(6).with_photos(["a.png", "b.png", "c.png"].map(|n| host.photo(n)));
    let temp = tempfile::tempdir().expect("tempdir");
    let renderer = renderer(vec![record], settings(temp.path()));

    let err = renderer
        .render(6, FailingSink::after(256))
        .await
        .expect_err("sink fails mid-stream");

    assert!(err.is_sink_failure(), "unexpected error: {}", err);
    assert_eq!(file_count(temp.path()), 0);
}

#[tokio::test]
async fn prepared_reports_release_assets_when_dropped() {
    if skip_without_fonts("prepared_reports_release_assets_when_dropped") {
        return;
    }
    let host = PhotoHost::start().await;
    let record = driver(7).with_photos(["a.png", "b.png"].map(|n| host.photo(n)));
    let temp = tempfile::tempdir().expect("tempdir");
    let renderer = renderer(vec![record], settings(temp.path()));

    let prepared = renderer.prepare(7).await.expect("prepare");
    assert_eq!(prepared.photo_count(), 2);
    assert_eq!(file_count(temp.path()), 2);

    drop(prepared);
    assert_eq!(file_count(temp.path()), 0);
}

#[tokio::test]
async fn slow_photos_time_out_and_are_skipped() {
    if skip_without_fonts("slow_photos_time_out_and_are_skipped") {
        return;
    }
    let host = PhotoHost::start().await;
    let record = driver(8).with_photos(["slow.png", "a.png"].map(|n| host.photo(n)));
    let temp = tempfile::tempdir().expect("tempdir");
    let renderer = renderer(vec![record], settings(temp.path()));

    let summary = renderer
        .render(8, SharedBuffer::default())
        .await
        .expect("render");

    assert_eq!(summary.placements.len(), 1);
    assert_eq!(summary.placements[0].source, host.url("a.png"));
    assert!(matches!(summary.skipped[0].reason, SkipReason::Fetch(_)));
}

#[tokio::test]
async fn repeated_renders_lay_out_identically() {
    if skip_without_fonts("repeated_renders_lay_out_identically") {
        return;
    }
    let host = PhotoHost::start().await;
    let record = driver(9).with_photos(
        ["a.png", "wide-b.png", "tall-c.png", "d.png"].map(|n| host.photo(n)),
    );
    let temp = tempfile::tempdir().expect("tempdir");
    let renderer = renderer(vec![record], settings(temp.path()));

    let sink_a = SharedBuffer::default();
    let sink_b = SharedBuffer::default();
    let summary_a = renderer.render(9, sink_a.clone()).await.expect("first render");
    let summary_b = renderer.render(9, sink_b.clone()).await.expect("second render");

    assert_eq!(summary_a.page_count, summary_b.page_count);
    assert_eq!(summary_a.footers, summary_b.footers);
    assert_eq!(summary_a.placements, summary_b.placements);

    let (bytes_a, bytes_b) = (sink_a.bytes(), sink_b.bytes());
    assert_eq!(page_count(&bytes_a), page_count(&bytes_b));
    assert_eq!(page_image_sizes(&bytes_a), page_image_sizes(&bytes_b));
    assert_eq!(
        image_sizes(&bytes_a),
        vec![(30, 90), (60, 60), (60, 60), (120, 40)]
    );
    assert_eq!(image_sizes(&bytes_a), image_sizes(&bytes_b));
}

#[tokio::test]
async fn photo_less_renders_are_byte_identical_after_normalization() {
    if skip_without_fonts("photo_less_renders_are_byte_identical_after_normalization") {
        return;
    }
    let temp = tempfile::tempdir().expect("tempdir");
    let renderer = renderer(vec![driver(10)], settings(temp.path()));

    let sink_a = SharedBuffer::default();
    let sink_b = SharedBuffer::default();
    renderer.render(10, sink_a.clone()).await.expect("first render");
    renderer.render(10, sink_b.clone()).await.expect("second render");

    let (bytes_a, bytes_b) = (sink_a.bytes(), sink_b.bytes());
    assert_eq!(bytes_a.len(), bytes_b.len(), "PDF sizes should match");
    assert_eq!(
        normalized_hash(&bytes_a),
        normalized_hash(&bytes_b),
        "PDF renders must be deterministic after metadata normalization"
    );
}

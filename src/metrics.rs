use std::sync::LazyLock;

use prometheus::*;

static METRIC_ADD_ITEM_COUNT: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("outfitdb_add_item_count", "count of the items added to catalog")
        .unwrap()
});

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("outfitdb_search_count", "count of the searches", &["mode"]).unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "outfitdb_search_duration",
        "duration of the search in seconds, including embedding",
        &["mode"]
    )
    .unwrap()
});

static METRIC_SEARCH_RESULTS: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "outfitdb_search_results",
        "number of the items returned by a search",
        &["mode"],
        vec![0., 1., 2., 3., 5., 10., 20., 50.]
    )
    .unwrap()
});

static METRIC_REBUILD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("outfitdb_rebuild_duration", "duration of the index rebuild in seconds")
        .unwrap()
});

static METRIC_CATALOG_SIZE: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("outfitdb_catalog_size", "number of the vectors in the index").unwrap()
});

/// 搜索方式：纯图片或图片加文本
fn search_mode(fused: bool) -> &'static str {
    match fused {
        true => "fused",
        false => "image",
    }
}

pub fn inc_add_item() {
    METRIC_ADD_ITEM_COUNT.inc();
}

pub fn observe_search(fused: bool, duration: f32, results: usize) {
    let mode = search_mode(fused);
    METRIC_SEARCH_COUNT.with_label_values(&[mode]).inc();
    METRIC_SEARCH_DURATION.with_label_values(&[mode]).observe(duration as f64);
    METRIC_SEARCH_RESULTS.with_label_values(&[mode]).observe(results as f64);
}

pub fn observe_rebuild(duration: f32) {
    METRIC_REBUILD_DURATION.observe(duration as f64);
}

pub fn set_catalog_size(size: usize) {
    METRIC_CATALOG_SIZE.set(size as i64);
}

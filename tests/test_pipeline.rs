mod common;

use std::fs;

use salient_tiles::{
    Channels, PipelineDriver, StrideMode, TileError, TilingConfig, run, run_path,
};

fn small_config(windows: Vec<u32>, output_size: u32) -> TilingConfig {
    let mut config = TilingConfig::new(windows, output_size, 0.25, 0.6);
    config.output_format = "png".to_string();
    config
}

#[test]
fn test_exact_fit_yields_one_patch() {
    let image = common::noise_rgb(640, 640, 7);
    let set = run(&image, &small_config(vec![640], 320)).unwrap();

    assert_eq!(set.len(), 1);
    let patch = &set.patches()[0];
    assert_eq!(patch.origin(), (0, 0));
    assert_eq!(patch.cell.size, 640);
    assert_eq!(patch.side, 320);
    assert_eq!(patch.channels, Channels::Rgb);
    assert_eq!(patch.pixels.len(), 320 * 320 * 3);
}

#[test]
fn test_image_smaller_than_every_window_is_empty() {
    let image = common::flat_gray(500, 500, 40);
    let set = run(&image, &small_config(vec![2560, 1280, 640], 64)).unwrap();
    assert!(set.is_empty());
}

#[test]
fn test_every_patch_has_output_dimensions() {
    let image = common::noise_rgb(300, 220, 3);
    let set = run(&image, &small_config(vec![200, 100], 48)).unwrap();

    assert!(!set.is_empty());
    for patch in &set {
        assert_eq!(patch.side, 48);
        assert_eq!(patch.pixels.len(), 48 * 48 * 3);
        assert!((0.0..=1.0).contains(&patch.saliency()));
    }
}

#[test]
fn test_generation_order_is_scale_then_row_major() {
    // 128px: stride 96, one cell. 64px: stride 48, three columns by two rows.
    let image = common::noise_rgb(200, 140, 11);
    let set = run(&image, &small_config(vec![128, 64], 32)).unwrap();

    let cells: Vec<(usize, u32, u32)> = set
        .iter()
        .map(|p| (p.cell.scale_index, p.cell.x, p.cell.y))
        .collect();
    assert_eq!(
        cells,
        vec![
            (0, 0, 0),
            (1, 0, 0),
            (1, 48, 0),
            (1, 96, 0),
            (1, 0, 48),
            (1, 48, 48),
            (1, 96, 48),
        ]
    );
    for (i, patch) in set.iter().enumerate() {
        assert_eq!(patch.index, i);
    }
}

#[test]
fn test_flat_image_gets_sparse_factor() {
    let image = common::flat_gray(256, 256, 90);
    let set = run(&image, &small_config(vec![128], 32)).unwrap();

    assert!(!set.is_empty());
    for patch in &set {
        // Only the border LBP codes differ, so the texture term stays tiny
        assert!(patch.saliency() < 0.05);
        assert_eq!(patch.cell.stride_factor, 0.9);
        assert_eq!(patch.channels, Channels::Gray);
        assert!(patch.pixels.iter().all(|&v| v.abs_diff(90) <= 1));
    }
}

#[test]
fn test_adaptive_stride_spreads_out_on_flat_input() {
    let image = common::flat_gray(256, 64, 0);
    let mut config = small_config(vec![64], 16);

    let fixed = run(&image, &config).unwrap();
    config.stride_mode = StrideMode::Adaptive;
    let adaptive = run(&image, &config).unwrap();

    // Fixed steps 48px, adaptive flat steps round(64 * 0.9) = 58px
    let xs = |set: &salient_tiles::PatchSet| set.iter().map(|p| p.cell.x).collect::<Vec<_>>();
    assert_eq!(xs(&fixed), vec![0, 48, 96, 144, 192]);
    assert_eq!(xs(&adaptive), vec![0, 58, 116, 174]);
}

#[test]
fn test_invalid_config_fails_before_reading() {
    let config = TilingConfig::new(vec![640], 640, 0.6, 0.25);
    let missing = std::path::Path::new("/no/such/dir/scan.png");

    match run_path(missing, &config, None) {
        Err(TileError::Config { field, .. }) => assert_eq!(field, "saliency_threshold_high"),
        other => panic!("expected a config error, got {other:?}"),
    }
}

#[test]
fn test_missing_file_is_image_read_error() {
    let config = small_config(vec![64], 32);
    let err = run_path(std::path::Path::new("/no/such/scan.png"), &config, None).unwrap_err();
    assert_eq!(err.category(), "image_read");
}

#[test]
fn test_run_path_without_output_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("scan.png");
    common::write_rgb_png(&src, 128, 128);

    let report = run_path(&src, &small_config(vec![128], 64), None).unwrap();
    assert_eq!(report.len(), 1);
    let set = report.patch_set.as_ref().unwrap();
    assert_eq!(set.len(), 1);
    assert_eq!(set.source(), Some("scan"));
    assert_eq!(set.source_dims(), (128, 128));
    assert!(report.saved.is_empty());
    assert!(report.manifest.is_none());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_split_image_scores_an_edge() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("split.png");
    common::write_rgb_png(&src, 128, 128);

    let report = run_path(&src, &small_config(vec![128], 64), None).unwrap();
    let set = report.patch_set.unwrap();
    let patch = &set.patches()[0];
    assert!(patch.saliency() > 0.0);
    // Left edge of the patch is still black, right edge white
    assert!(patch.pixels[0] < 16);
    assert!(patch.pixels[(64 - 1) * 3] > 239);
}

#[test]
fn test_persisted_names_span_scales() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("a.png");
    let out = dir.path().join("patches");
    common::write_rgb_png(&src, 200, 140);

    let driver = PipelineDriver::new(small_config(vec![128, 64], 32)).unwrap();
    let report = driver.run_path(&src, Some(&out)).unwrap();

    assert_eq!(report.saved.len(), 7);
    assert_eq!(report.len(), 7);
    for i in 0..7 {
        let name = format!("a_patch_{:04}.png", i);
        assert_eq!(report.saved[i], out.join(&name));
        let decoded = image::open(out.join(&name)).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 32));
    }
}

#[test]
fn test_manifest_describes_every_patch() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("page.png");
    let out = dir.path().join("out");
    common::write_gray_png(&src, 200, 140, 200);

    let mut config = small_config(vec![128, 64], 32);
    config.write_manifest = true;
    let report = run_path(&src, &config, Some(&out)).unwrap();

    let manifest_path = report.manifest.unwrap();
    assert_eq!(manifest_path, out.join("page_patches.json"));
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&manifest_path).unwrap()).unwrap();

    assert_eq!(json["source"], "page");
    assert_eq!(json["source_width"], 200);
    assert_eq!(json["output_size"], 32);
    let patches = json["patches"].as_array().unwrap();
    assert_eq!(patches.len(), 7);
    assert_eq!(patches[0]["file"], "page_patch_0000.png");
    assert_eq!(patches[0]["scale_index"], 0);
    assert_eq!(patches[6]["x"], 96);
    assert_eq!(patches[6]["y"], 48);
    assert_eq!(patches[6]["stride_factor"], 0.9);
}

#[test]
fn test_persisted_run_keeps_no_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("big.png");
    let out = dir.path().join("out");
    common::write_rgb_png(&src, 200, 140);

    let in_memory = run_path(&src, &small_config(vec![128, 64], 32), None).unwrap();
    let persisted = run_path(&src, &small_config(vec![128, 64], 32), Some(&out)).unwrap();

    assert!(persisted.patch_set.is_none());
    assert_eq!(persisted.cells, in_memory.cells);
    assert_eq!(persisted.saved.len(), persisted.cells.len());
    assert_eq!(fs::read_dir(&out).unwrap().count(), 7);

    // Files on disk carry the pixels the in-memory run returned
    let set = in_memory.patch_set.unwrap();
    let first = image::open(&persisted.saved[0]).unwrap().into_rgb8();
    assert_eq!(first.as_raw(), &set.patches()[0].pixels);
}

#[test]
fn test_in_memory_manifest_has_no_files() {
    let image = common::noise_rgb(200, 140, 5);
    let set = run(&image, &small_config(vec![128, 64], 32)).unwrap();

    let manifest = set.manifest(&[]);
    assert_eq!(manifest.source, None);
    assert_eq!(manifest.output_size, Some(32));
    assert_eq!(manifest.patches.len(), set.len());
    assert!(manifest.patches.iter().all(|e| e.file.is_none()));
    assert_eq!(manifest.patches[3].x, set.patches()[3].cell.x);
}

#[test]
fn test_unsupported_patch_format_is_rejected_up_front() {
    let mut config = small_config(vec![64], 32);
    config.output_format = "hdr".to_string();
    let err = run_path(std::path::Path::new("/no/such/scan.png"), &config, None).unwrap_err();
    assert_eq!(err.category(), "config");
}

use std::fs;

use glam::UVec2;

use wgpu_passes::renderer::passes::{downsample_plan, mip_sizes, upsample_plan};
use wgpu_passes::settings::{CaptureMode, RenderSettings};

#[test]
fn square_viewport_chain_matches_the_bloom_levels() {
    let sizes = mip_sizes(UVec2::splat(512), 5);
    assert_eq!(
        sizes,
        vec![
            UVec2::splat(512),
            UVec2::splat(256),
            UVec2::splat(128),
            UVec2::splat(64),
            UVec2::splat(32),
        ]
    );

    // Level i reads level i - 1; the upsample ends on mip 0.
    assert_eq!(downsample_plan(sizes.len()).last(), Some(&(Some(3), 4)));
    assert_eq!(upsample_plan(sizes.len()).last(), Some(&(1, 0)));
}

#[test]
fn default_chain_for_a_720p_viewport() {
    let settings = RenderSettings::default();
    let viewport = UVec2::new(1280, 720);

    let sizes = mip_sizes(viewport, settings.bloom.mip_levels);
    assert_eq!(sizes.len(), settings.bloom.mip_levels);
    assert_eq!(sizes.first(), Some(&viewport));
    assert_eq!(sizes.last(), Some(&UVec2::new(80, 45)));

    for pair in sizes.windows(2) {
        assert_eq!(pair[1], pair[0] / 2);
    }
    for level in 0..sizes.len() {
        assert_eq!(settings.bloom.mip_weight(level), 1.0);
    }
}

#[test]
fn tiny_viewport_gets_a_short_chain() {
    let sizes = mip_sizes(UVec2::new(10, 6), 5);
    assert_eq!(
        sizes,
        vec![UVec2::new(10, 6), UVec2::new(5, 3), UVec2::new(2, 1)]
    );
    assert_eq!(upsample_plan(sizes.len()), vec![(2, 1), (1, 0)]);
}

#[test]
fn settings_file_is_validated_on_load() {
    let dir = std::env::temp_dir().join(format!("wgpu-passes-bloom-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("settings.json");
    fs::write(
        &path,
        r#"{
            "bloom": {
                "threshold_min": 3.0,
                "threshold_max": 1.0,
                "mip_levels": 3,
                "mip_weights": [1.0, 0.5, 0.25, 0.1, 0.05]
            },
            "reflection": { "mode": "dynamic", "face_size": 256 }
        }"#,
    )
    .unwrap();

    let settings = RenderSettings::load_from_path(&path);
    fs::remove_dir_all(&dir).unwrap();

    assert!(settings.bloom.threshold_max > settings.bloom.threshold_min);
    assert_eq!(settings.bloom.mip_weights, vec![1.0, 0.5, 0.25]);
    assert_eq!(settings.bloom.mip_weight(3), 0.0);
    assert_eq!(settings.reflection.mode, CaptureMode::Dynamic);
    assert_eq!(settings.reflection.face_size, 256);
}

#[test]
fn unparsable_settings_fall_back_to_defaults() {
    let dir = std::env::temp_dir().join(format!("wgpu-passes-broken-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("settings.json");
    fs::write(&path, "{ not json").unwrap();

    let settings = RenderSettings::load_from_path(&path);
    fs::remove_dir_all(&dir).unwrap();

    assert_eq!(settings.shadow_map_size, RenderSettings::default().shadow_map_size);
    assert_eq!(settings.bloom, RenderSettings::default().bloom);
}

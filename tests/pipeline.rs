use ndarray::{array, Array2};
use opencv::core::{self, Mat, Point, Scalar, Size};
use opencv::prelude::*;
use opencv::{imgproc, videoio};
use std::path::{Path, PathBuf};
use shotzone::config::{ClipErrorPolicy, PipelineConfig};
use shotzone::dataset::Samples;
use shotzone::pipeline;
use shotzone::{ClipProcessor, CourtGeometry, Error, Zone, ZoneClassifier};

fn court_image() -> Mat {
    let mut image =
        Mat::new_rows_cols_with_default(200, 400, core::CV_8UC3, Scalar::all(0.0)).unwrap();
    imgproc::rectangle_points(
        &mut image,
        Point::new(50, 50),
        Point::new(350, 150),
        Scalar::all(255.0),
        2,
        imgproc::LINE_8,
        0,
    )
    .unwrap();

    image
}

fn write_clip(dir: &Path, stem: &str, n_frames: usize, hit_frame: usize) -> PathBuf {
    let path = dir.join(format!("{}.avi", stem));
    let fourcc = videoio::VideoWriter::fourcc('M', 'J', 'P', 'G').unwrap();
    let mut writer =
        videoio::VideoWriter::new(&path.to_string_lossy(), fourcc, 25.0, Size::new(400, 200), true)
            .unwrap();

    for _ in 0..n_frames {
        writer.write(&court_image()).unwrap();
    }
    writer.release().unwrap();

    std::fs::write(
        dir.join(format!("{}.json", stem)),
        format!(r#"{{"hit_frame": {}}}"#, hit_frame),
    )
    .unwrap();

    path
}

fn zones(ids: &[i64]) -> Vec<Zone> {
    ids.iter().map(|&z| Zone::new(z).unwrap()).collect()
}

#[test]
fn rectangle_homography_is_accurate() {
    let (_, err) = CourtGeometry::default()
        .estimate_homography(&court_image())
        .unwrap();

    assert!(err < 3.0, "residual {}", err);
}

#[test]
fn trained_model_covers_all_zones() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let model_path = dir.path().join("model.json");

    pipeline::run_training(&data, &model_path, &PipelineConfig::default()).unwrap();
    assert!(model_path.exists());

    let model = ZoneClassifier::load(&model_path).unwrap();
    let probs = model.predict_proba(Array2::<f32>::zeros((1, 10)).view()).unwrap();

    assert_eq!(probs.dim(), (1, 6));
    assert!((probs.row(0).sum() - 1.0).abs() < 1e-9);
}

#[test]
fn separable_zones_are_learned() {
    let x = array![
        [-2.0f32, 0., 0., 0., 0., 0., 0., 0., 0., 0.],
        [-1.5, 0., 0., 0., 0., 0., 0., 0., 0., 0.],
        [-1.0, 0., 0., 0., 0., 0., 0., 0., 0., 0.],
        [1.0, 0., 0., 0., 0., 0., 0., 0., 0., 0.],
        [1.5, 0., 0., 0., 0., 0., 0., 0., 0., 0.],
        [2.0, 0., 0., 0., 0., 0., 0., 0., 0., 0.],
    ];
    let y = zones(&[0, 0, 0, 5, 5, 5]);

    let model = ZoneClassifier::fit(x.view(), &y, &Default::default()).unwrap();

    assert_eq!(model.score(x.view(), &y).unwrap(), 1.0);
    assert_eq!(model.classes(), zones(&[0, 5]).as_slice());
}

#[test]
fn persisted_model_predicts_identically() {
    let samples = Samples::synthetic(60, 7);
    let model =
        ZoneClassifier::fit(samples.features.view(), &samples.zones().unwrap(), &Default::default())
            .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("model.json");
    model.save(&path).unwrap();
    let loaded = ZoneClassifier::load(&path).unwrap();

    assert_eq!(
        model.predict_proba(samples.features.view()).unwrap(),
        loaded.predict_proba(samples.features.view()).unwrap()
    );
}

#[test]
fn empty_corpus_writes_synthetic_splits() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw");
    let out = dir.path().join("processed");
    std::fs::create_dir_all(&raw).unwrap();

    let (n_train, n_val) = pipeline::run_preprocess(&raw, &out, &PipelineConfig::default()).unwrap();
    assert_eq!((n_train, n_val), (70, 30));

    for name in ["train.json", "train_labels.json", "val.json", "val_labels.json"] {
        assert!(out.join(name).exists(), "{} missing", name);
    }
}

#[test]
fn broken_clip_policy() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw");
    let out = dir.path().join("processed");
    std::fs::create_dir_all(&raw).unwrap();
    std::fs::write(raw.join("garbage.mp4"), b"\x00\x01\x02").unwrap();

    let mut config = PipelineConfig::default();
    let res = pipeline::run_preprocess(&raw, &out, &config);
    assert!(matches!(res, Err(Error::EmptyVideo(_))));

    // skipping the only clip leaves nothing, so the synthetic set is written
    config.on_clip_error = ClipErrorPolicy::Skip;
    assert_eq!(pipeline::run_preprocess(&raw, &out, &config).unwrap(), (70, 30));
}

#[test]
fn demo_without_clips_fails_clearly() {
    let dir = tempfile::tempdir().unwrap();
    let res = pipeline::run_demo(dir.path(), &dir.path().join("model.json"), &Default::default());

    assert!(matches!(res, Err(Error::NoClips(_))));
}

#[test]
fn inference_on_a_clip() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default();
    let model_path = dir.path().join("model.json");
    pipeline::run_training(&dir.path().join("data"), &model_path, &config).unwrap();
    let model = ZoneClassifier::load(&model_path).unwrap();

    let clip = write_clip(dir.path(), "rally", 4, 2);

    let overridden = pipeline::infer_clip(&model_path, &clip, Some(1), &config).unwrap();
    assert_eq!(overridden.hit_frame, 1);
    assert_eq!(overridden.probabilities.len(), model.classes().len());
    for (&(zone, _), class) in overridden.probabilities.iter().zip(model.classes()) {
        assert_eq!(zone, *class);
    }

    let total: f64 = overridden.probabilities.iter().map(|(_, p)| p).sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(model.classes().contains(&overridden.predicted));

    let expected = ClipProcessor::new(&config).process_at(&clip, 1).unwrap();
    assert_eq!(overridden.geometric, expected.zone);

    // without an override the label file decides
    let labelled = pipeline::infer_clip(&model_path, &clip, None, &config).unwrap();
    assert_eq!(labelled.hit_frame, 2);
}

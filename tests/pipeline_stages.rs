//! End-to-end pipeline behavior on the CPU backend.

use nirvein::{
    ApprovalRegion, DisplayStage, Frame, FrameParams, FrangiProcessor, GlobalContrast,
};

/// Gradient frame with a dark horizontal band (a vein-like structure).
fn vein_frame(width: usize, height: usize) -> Frame {
    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let base = 120 + (x % 40) as u8;
            let v = if (28..31).contains(&y) { 40 } else { base };
            data.extend_from_slice(&[v, v, v]);
        }
    }
    Frame::new(data, width, height, 3).unwrap()
}

fn base_params() -> FrameParams {
    FrameParams {
        invert: false,
        ..FrameParams::default()
    }
}

#[test]
fn cpu_backend_reports_its_method() {
    let processor = FrangiProcessor::cpu();
    assert_eq!(processor.method_name(), "CPU (scalar)");
    assert!(!processor.is_gpu());
}

#[test]
fn every_stage_produces_a_full_resolution_artifact() {
    let frame = vein_frame(64, 60);
    let mut processor = FrangiProcessor::cpu();
    for index in 0..=6 {
        let params = FrameParams {
            stage: DisplayStage::from_index(index).unwrap(),
            ..base_params()
        };
        let output = processor.process(&frame, &params).unwrap();
        assert_eq!(output.image.width(), 64, "stage {index}");
        assert_eq!(output.image.height(), 60, "stage {index}");
        assert_eq!(output.processed_size, (64, 60));
        assert!(output.approval.is_none());
    }
}

#[test]
fn grayscale_stage_returns_the_luma_plane() {
    let frame = vein_frame(32, 32);
    let mut processor = FrangiProcessor::cpu();
    let output = processor
        .process(
            &frame,
            &FrameParams {
                stage: DisplayStage::Grayscale,
                ..base_params()
            },
        )
        .unwrap();
    assert_eq!(output.image, frame.to_gray());
}

#[test]
fn inverted_stage_flips_intensities() {
    let frame = vein_frame(32, 32);
    let mut processor = FrangiProcessor::cpu();
    let output = processor
        .process(
            &frame,
            &FrameParams {
                stage: DisplayStage::Inverted,
                invert: true,
                ..base_params()
            },
        )
        .unwrap();
    let gray = frame.to_gray();
    for (&inv, &orig) in output.image.data().iter().zip(gray.data()) {
        assert_eq!(inv, 255 - orig);
    }
}

#[test]
fn segmentation_is_deterministic_across_runs() {
    let frame = vein_frame(48, 48);
    let params = FrameParams {
        stage: DisplayStage::Segmentation,
        ..base_params()
    };
    let mut processor = FrangiProcessor::cpu();
    let first = processor.process(&frame, &params).unwrap();
    let second = processor.process(&frame, &params).unwrap();
    assert_eq!(first.image, second.image);
}

#[test]
fn segmentation_artifact_is_binary() {
    let frame = vein_frame(48, 48);
    let mut processor = FrangiProcessor::cpu();
    let output = processor
        .process(
            &frame,
            &FrameParams {
                stage: DisplayStage::Segmentation,
                ..base_params()
            },
        )
        .unwrap();
    assert!(output.image.data().iter().all(|&v| v == 0 || v == 255));
}

#[test]
fn zero_threshold_approves_everything() {
    // Threshold 0 marks every pixel as foreground, so the gate saturates
    // regardless of image content.
    let frame = vein_frame(64, 48);
    let mut processor = FrangiProcessor::cpu();
    let output = processor
        .process(
            &frame,
            &FrameParams {
                stage: DisplayStage::Grayscale,
                segmentation_threshold: 0.0,
                approval: Some(ApprovalRegion {
                    width: 20,
                    height: 10,
                    threshold: 1.0,
                }),
                ..base_params()
            },
        )
        .unwrap();
    let approval = output.approval.unwrap();
    assert!((approval.ratio - 1.0).abs() < 1e-6);
    assert!(approval.approved);
    // The display artifact is still the requested one.
    assert_eq!(output.image, frame.to_gray());
}

#[test]
fn all_black_frame_yields_empty_mask_and_zero_ratio() {
    let frame = Frame::new(vec![0; 100 * 100], 100, 100, 1).unwrap();
    let mut processor = FrangiProcessor::cpu();
    let output = processor
        .process(
            &frame,
            &FrameParams {
                stage: DisplayStage::Segmentation,
                approval: Some(ApprovalRegion::default()),
                ..base_params()
            },
        )
        .unwrap();
    assert!(output.image.data().iter().all(|&v| v == 0));
    let approval = output.approval.unwrap();
    assert_eq!(approval.ratio, 0.0);
    assert!(!approval.approved);
}

#[test]
fn global_contrast_changes_the_grayscale_artifact() {
    let frame = vein_frame(32, 32);
    let mut processor = FrangiProcessor::cpu();
    let plain = processor
        .process(
            &frame,
            &FrameParams {
                stage: DisplayStage::Grayscale,
                ..base_params()
            },
        )
        .unwrap();
    let boosted = processor
        .process(
            &frame,
            &FrameParams {
                stage: DisplayStage::Grayscale,
                global_contrast: Some(GlobalContrast {
                    brightness: 0.0,
                    contrast: 2.0,
                }),
                ..base_params()
            },
        )
        .unwrap();
    assert_ne!(plain.image, boosted.image);
}

#[test]
fn overlay_brightens_masked_pixels_only() {
    let frame = vein_frame(64, 60);
    let mut processor = FrangiProcessor::cpu();
    // The dark band scores under dark-ridge polarity (no inversion).
    let params = FrameParams {
        stage: DisplayStage::Overlay,
        segmentation_threshold: 1e-5,
        ..base_params()
    };
    let overlay = processor.process(&frame, &params).unwrap();
    let gray = frame.to_gray();

    let mut brightened = 0usize;
    for (&o, &g) in overlay.image.data().iter().zip(gray.data()) {
        assert!(o >= g.saturating_sub(1));
        if o > g.saturating_add(4) {
            brightened += 1;
        }
    }
    assert!(brightened > 0, "no overlay pixels were brightened");
}

// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use fitcam::constants::{self, endpoints, file_formats, timing};

#[test]
fn test_countdown_fits_inside_auto_interval() {
    // A countdown capture must finish before the next periodic trigger
    let countdown = timing::COUNTDOWN_TICK * timing::COUNTDOWN_TICKS + timing::COUNTDOWN_SETTLE;
    assert!(countdown < timing::AUTO_ANALYZE_INTERVAL);
}

#[test]
fn test_endpoints_are_absolute_paths() {
    for path in [
        endpoints::ANALYZE,
        endpoints::UPLOAD_STYLE,
        endpoints::STYLES,
        endpoints::HEALTH,
    ] {
        assert!(path.starts_with('/'), "{} should start with '/'", path);
        assert!(!path.ends_with('/'), "{} should not end with '/'", path);
    }
}

#[test]
fn test_image_extensions_are_lowercase() {
    for ext in file_formats::IMAGE_EXTENSIONS {
        assert_eq!(*ext, ext.to_lowercase());
        assert!(!ext.starts_with('.'));
    }
}

#[test]
fn test_style_limit() {
    assert_eq!(constants::MAX_STYLE_IMAGES, 5);
}

//! Docker operations module
//!
//! This module provides the daemon-side half of image assembly:
//! - Docker client wrapper with connection handling
//! - Docker-specific error types
//! - Dockerfile rendering from a build plan
//! - Progress reporting for builds
//! - Image build with an explicit target, and cleanup of built images

mod client;
mod dockerfile;
mod error;
pub mod image;
pub mod progress;

// Core types
pub use client::DockerClient;
pub use error::DockerError;
pub use progress::ProgressReporter;

// Dockerfile rendering
pub use dockerfile::{BUILD_TARGET_LABEL, TIMEZONE_BUILD_ARG, render_dockerfile};

// Image operations
pub use image::{
    BuildRequest, build_image, create_build_context, image_exists, image_labels,
    remove_built_images,
};

//! Docker image build operations
//!
//! This module sends the rendered Dockerfile plus the build context to the
//! Docker daemon, selects the requested stage as the build target and streams
//! progress back to the caller.

use super::dockerfile::{BUILD_TARGET_LABEL, TIMEZONE_BUILD_ARG};
use super::progress::ProgressReporter;
use super::{DockerClient, DockerError};
use crate::image::{BuildContext, BuildTarget};
use bollard::moby::buildkit::v1::StatusResponse as BuildkitStatusResponse;
use bollard::models::BuildInfoAux;
use bollard::query_parameters::{
    BuildImageOptions, BuilderVersion, ListImagesOptionsBuilder, RemoveImageOptionsBuilder,
};
use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use futures_util::StreamExt;
use http_body_util::{Either, Full};
use std::collections::{HashMap, HashSet, VecDeque};
use std::env;
use std::time::{SystemTime, UNIX_EPOCH};
use tar::Builder as TarBuilder;
use tracing::debug;

/// Default number of recent build log lines to capture for error context
const DEFAULT_BUILD_LOG_BUFFER_SIZE: usize = 20;

/// Default number of error lines to capture separately
const DEFAULT_ERROR_LOG_BUFFER_SIZE: usize = 10;

pub const LABEL_TITLE: &str = "org.opencontainers.image.title";
pub const LABEL_TITLE_VALUE: &str = "wptagent";

/// Everything needed to build one target
pub struct BuildRequest<'a> {
    /// Rendered Dockerfile
    pub dockerfile: &'a str,
    pub context: &'a BuildContext,
    pub target: BuildTarget,
    /// Full `repo:tag` reference to tag the result with
    pub image: &'a str,
    pub timezone: &'a str,
    pub no_cache: bool,
}

/// Read a log buffer size from env with bounds
fn read_log_buffer_size(var_name: &str, default: usize) -> usize {
    let Ok(value) = env::var(var_name) else {
        return default;
    };
    let Ok(parsed) = value.trim().parse::<usize>() else {
        return default;
    };
    parsed.clamp(5, 500)
}

/// Check if a line looks like an error message
fn is_error_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("error")
        || lower.contains("failed")
        || lower.contains("cannot")
        || lower.contains("unable to")
        || lower.contains("not found")
        || lower.contains("permission denied")
}

/// Check if an image reference exists locally
pub async fn image_exists(client: &DockerClient, reference: &str) -> Result<bool, DockerError> {
    debug!("Checking if image exists: {}", reference);

    match client.inner().inspect_image(reference).await {
        Ok(_) => Ok(true),
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => Ok(false),
        Err(e) => Err(DockerError::from(e)),
    }
}

/// Build labels attached to every image this tool produces
pub fn image_labels(target: BuildTarget) -> HashMap<String, String> {
    HashMap::from([
        (LABEL_TITLE.to_string(), LABEL_TITLE_VALUE.to_string()),
        (BUILD_TARGET_LABEL.to_string(), target.stage_name().to_string()),
    ])
}

/// Build one target of the wptagent image
///
/// Returns the image ID reported by the daemon (or "unknown").
pub async fn build_image(
    client: &DockerClient,
    request: &BuildRequest<'_>,
    progress: &mut ProgressReporter,
) -> Result<String, DockerError> {
    debug!(
        "Building {} as {} (no_cache: {})",
        request.target, request.image, request.no_cache
    );

    let context = create_build_context(request.dockerfile, request.context)
        .map_err(|e| DockerError::Build(format!("Failed to create build context: {e}")))?;

    // BuildKit requires a unique session ID for each build
    let session_id = format!(
        "wptagent-image-build-{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    );
    let build_args = HashMap::from([(
        TIMEZONE_BUILD_ARG.to_string(),
        request.timezone.to_string(),
    )]);
    let options = BuildImageOptions {
        t: Some(request.image.to_string()),
        dockerfile: "Dockerfile".to_string(),
        version: BuilderVersion::BuilderBuildKit,
        session: Some(session_id),
        rm: true,
        nocache: request.no_cache,
        buildargs: Some(build_args),
        labels: Some(image_labels(request.target)),
        platform: String::new(),
        target: request.target.stage_name().to_string(),
        ..Default::default()
    };

    let body: Either<Full<Bytes>, _> = Either::Left(Full::new(Bytes::from(context)));
    let mut stream = client.inner().build_image(options, None, Some(body));

    progress.add_spinner("build", "Sending build context...");

    let mut maybe_image_id = None;
    let mut log_state = BuildLogState::new();

    while let Some(result) = stream.next().await {
        let info = match result {
            Ok(info) => info,
            Err(err) => {
                return Err(handle_stream_error(
                    "Build failed",
                    err.to_string(),
                    &log_state,
                    progress,
                ));
            }
        };

        handle_stream_message(&info, progress, &mut log_state);

        if let Some(error_detail) = &info.error_detail
            && let Some(error_msg) = &error_detail.message
        {
            progress.abandon_all(error_msg);
            return Err(DockerError::Build(format_build_error_with_context(
                error_msg,
                &log_state.recent_logs,
                &log_state.error_logs,
                &log_state.recent_buildkit_logs,
            )));
        }

        if let Some(aux) = info.aux {
            match aux {
                BuildInfoAux::Default(image_id) => {
                    if let Some(id) = image_id.id {
                        maybe_image_id = Some(id);
                    }
                }
                BuildInfoAux::BuildKit(status) => {
                    handle_buildkit_status(&status, progress, &mut log_state);
                }
            }
        }
    }

    let image_id = maybe_image_id.unwrap_or_else(|| "unknown".to_string());
    progress.finish("build", &format!("Built {} ({image_id})", request.image));
    Ok(image_id)
}

struct BuildLogState {
    recent_logs: VecDeque<String>,
    error_logs: VecDeque<String>,
    recent_buildkit_logs: VecDeque<String>,
    build_log_buffer_size: usize,
    error_log_buffer_size: usize,
    vertex_name_by_vertex_id: HashMap<String, String>,
}

impl BuildLogState {
    fn new() -> Self {
        let build_log_buffer_size =
            read_log_buffer_size("WPT_IMAGE_BUILD_LOG_TAIL", DEFAULT_BUILD_LOG_BUFFER_SIZE);
        let error_log_buffer_size =
            read_log_buffer_size("WPT_IMAGE_BUILD_ERROR_TAIL", DEFAULT_ERROR_LOG_BUFFER_SIZE);
        Self {
            recent_logs: VecDeque::with_capacity(build_log_buffer_size),
            error_logs: VecDeque::with_capacity(error_log_buffer_size),
            recent_buildkit_logs: VecDeque::with_capacity(build_log_buffer_size),
            build_log_buffer_size,
            error_log_buffer_size,
            vertex_name_by_vertex_id: HashMap::new(),
        }
    }

    fn push_log(&mut self, line: &str) {
        push_bounded(&mut self.recent_logs, line, self.build_log_buffer_size);
        if is_error_line(line) {
            push_bounded(&mut self.error_logs, line, self.error_log_buffer_size);
        }
    }
}

fn push_bounded(buffer: &mut VecDeque<String>, line: &str, limit: usize) {
    if buffer.len() >= limit {
        buffer.pop_front();
    }
    buffer.push_back(line.to_string());
}

fn handle_stream_message(
    info: &bollard::models::BuildInfo,
    progress: &mut ProgressReporter,
    state: &mut BuildLogState,
) {
    let Some(stream_msg) = info.stream.as_deref() else {
        return;
    };
    let msg = stream_msg.trim();
    if msg.is_empty() {
        return;
    }

    if progress.is_plain_output() {
        eprint!("{stream_msg}");
    } else {
        progress.update_spinner("build", msg);
    }
    state.push_log(msg);
}

fn handle_buildkit_status(
    status: &BuildkitStatusResponse,
    progress: &mut ProgressReporter,
    state: &mut BuildLogState,
) {
    for vertex in &status.vertexes {
        if vertex.name.is_empty() {
            continue;
        }
        state
            .vertex_name_by_vertex_id
            .entry(vertex.digest.clone())
            .or_insert_with(|| vertex.name.clone());
        if vertex.started.is_some() && vertex.completed.is_none() {
            progress.update_spinner("build", &vertex.name);
        }
    }

    for log in &status.logs {
        let name = state
            .vertex_name_by_vertex_id
            .get(&log.vertex)
            .cloned()
            .unwrap_or_else(|| format_vertex_fallback_label(&log.vertex));
        let text = String::from_utf8_lossy(&log.msg).replace('\r', "");
        for line in text.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
            if progress.is_plain_output() {
                eprintln!("[{name}] {line}");
            }
            let tagged = format!("[{name}] {line}");
            push_bounded(
                &mut state.recent_buildkit_logs,
                &tagged,
                state.build_log_buffer_size,
            );
            if is_error_line(line) {
                push_bounded(&mut state.error_logs, &tagged, state.error_log_buffer_size);
            }
        }
    }
}

fn format_vertex_fallback_label(vertex_id: &str) -> String {
    let short = vertex_id
        .strip_prefix("sha256:")
        .unwrap_or(vertex_id)
        .chars()
        .take(12)
        .collect::<String>();
    format!("vertex {short}")
}

fn handle_stream_error(
    prefix: &str,
    error_str: String,
    state: &BuildLogState,
    progress: &mut ProgressReporter,
) -> DockerError {
    progress.abandon_all(prefix);

    let buildkit_hint = if error_str.contains("--chmod") || error_str.contains("syntax") {
        "\n\nNote: The generated Dockerfile uses BuildKit features (COPY --chmod).\n\
         Ensure BuildKit is enabled for the Docker daemon and it is up to date."
    } else {
        ""
    };

    DockerError::Build(format!(
        "{}{}",
        format_build_error_with_context(
            &error_str,
            &state.recent_logs,
            &state.error_logs,
            &state.recent_buildkit_logs,
        ),
        buildkit_hint
    ))
}

/// Format a build error with recent log context for actionable debugging
fn format_build_error_with_context(
    error: &str,
    recent_logs: &VecDeque<String>,
    error_logs: &VecDeque<String>,
    recent_buildkit_logs: &VecDeque<String>,
) -> String {
    let mut message = String::from(error);

    // Error-like lines that already scrolled out of the recent tails
    let shown: HashSet<&String> = recent_logs.iter().chain(recent_buildkit_logs).collect();
    let unique_errors: Vec<_> = error_logs
        .iter()
        .filter(|line| !shown.contains(line))
        .collect();
    if !unique_errors.is_empty() {
        message.push_str("\n\nPotential errors detected during build:");
        for line in unique_errors {
            message.push_str("\n  ");
            message.push_str(line);
        }
    }

    if !recent_buildkit_logs.is_empty() {
        message.push_str("\n\nRecent BuildKit output:");
        for line in recent_buildkit_logs {
            message.push_str("\n  ");
            message.push_str(line);
        }
    }

    if !recent_logs.is_empty() {
        message.push_str("\n\nRecent build output:");
        for line in recent_logs {
            message.push_str("\n  ");
            message.push_str(line);
        }
    } else if recent_buildkit_logs.is_empty() {
        message.push_str("\n\nNo build output was received from the Docker daemon.");
    }

    let error_lower = error.to_lowercase();
    if error_lower.contains("unable to locate package")
        || error_lower.contains("no matching distribution")
        || error_lower.contains("404")
    {
        message.push_str(
            "\n\nSuggestion: A package could not be found. Check the package lists in the config file.",
        );
    } else if error_lower.contains("network")
        || error_lower.contains("connection")
        || error_lower.contains("timeout")
    {
        message.push_str("\n\nSuggestion: Check your network connection and Docker's ability to reach the internet.");
    } else if error_lower.contains("no space") || error_lower.contains("disk") {
        message.push_str("\n\nSuggestion: Free up disk space with 'docker system prune' or check available storage.");
    } else if error_lower.contains("test -f") || error_lower.contains("mv ") {
        message.push_str(
            "\n\nSuggestion: The debug stage could not move the agent script aside. Check that wptagent.py exists and wptagent_starter.py does not.",
        );
    }

    message
}

/// Create a gzipped tar archive with the Dockerfile and every context file
pub fn create_build_context(
    dockerfile: &str,
    context: &BuildContext,
) -> Result<Vec<u8>, std::io::Error> {
    let mut archive_buffer = Vec::new();

    {
        let encoder = GzEncoder::new(&mut archive_buffer, Compression::default());
        let mut tar = TarBuilder::new(encoder);

        append_file(&mut tar, "Dockerfile", dockerfile.as_bytes(), 0o644)?;
        for (path, file) in context.files() {
            append_file(&mut tar, path, &file.contents, file.mode)?;
        }
        tar.finish()?;

        let encoder = tar.into_inner()?;
        encoder.finish()?;
    }

    Ok(archive_buffer)
}

fn append_file<W: std::io::Write>(
    tar: &mut TarBuilder<W>,
    path: &str,
    contents: &[u8],
    mode: u32,
) -> Result<(), std::io::Error> {
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(mode);
    // Fixed mtime keeps the context byte-identical across runs
    header.set_mtime(0);
    // append_data writes GNU long-name entries for deep source paths
    tar.append_data(&mut header, path, contents)
}

/// Remove every local image labelled as built by this tool
///
/// Returns the number of images removed.
pub async fn remove_built_images(client: &DockerClient, force: bool) -> Result<usize, DockerError> {
    let list_options = ListImagesOptionsBuilder::new().all(true).build();
    let images = client
        .inner()
        .list_images(Some(list_options))
        .await
        .map_err(|e| DockerError::Image(format!("Failed to list images: {e}")))?;

    let image_ids: HashSet<String> = images
        .iter()
        .filter(|image| image_labels_match(&image.labels))
        .map(|image| image.id.clone())
        .collect();
    if image_ids.is_empty() {
        return Ok(0);
    }

    let remove_options = RemoveImageOptionsBuilder::new().force(force).build();
    let mut removed = 0usize;
    for image_id in image_ids {
        match client
            .inner()
            .remove_image(&image_id, Some(remove_options.clone()), None)
            .await
        {
            Ok(_) => removed += 1,
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                debug!("Docker image already removed: {}", image_id);
            }
            Err(err) => {
                return Err(DockerError::Image(format!(
                    "Failed to remove image {image_id}: {err}"
                )));
            }
        }
    }
    Ok(removed)
}

fn image_labels_match(labels: &HashMap<String, String>) -> bool {
    labels
        .get(LABEL_TITLE)
        .is_some_and(|value| value == LABEL_TITLE_VALUE)
        && labels.contains_key(BUILD_TARGET_LABEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tar::Archive;

    fn archive_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>, u32)> {
        let mut archive = Archive::new(GzDecoder::new(bytes));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let path = entry.path().unwrap().to_string_lossy().to_string();
                let mode = entry.header().mode().unwrap();
                let mut contents = Vec::new();
                entry.read_to_end(&mut contents).unwrap();
                (path, contents, mode)
            })
            .collect()
    }

    #[test]
    fn build_context_contains_dockerfile_and_files() {
        let mut ctx = BuildContext::new();
        ctx.insert("agent/wptagent.py", "print()", 0o644);
        ctx.insert("init/wpt-init", "bin", 0o755);

        let bytes = create_build_context("FROM scratch\n", &ctx).unwrap();
        assert_eq!(bytes[0], 0x1f, "should be gzip compressed");
        assert_eq!(bytes[1], 0x8b, "should be gzip compressed");

        let entries = archive_entries(&bytes);
        assert_eq!(entries[0].0, "Dockerfile");
        assert_eq!(entries[0].1, b"FROM scratch\n");
        assert!(entries.iter().any(|(p, c, _)| p == "agent/wptagent.py" && c == b"print()"));
        assert!(entries.iter().any(|(p, _, m)| p == "init/wpt-init" && *m == 0o755));
    }

    #[test]
    fn build_context_is_deterministic() {
        let mut ctx = BuildContext::new();
        ctx.insert("agent/wptagent.py", "print()", 0o644);
        assert_eq!(
            create_build_context("FROM scratch\n", &ctx).unwrap(),
            create_build_context("FROM scratch\n", &ctx).unwrap()
        );
    }

    #[test]
    fn labels_record_build_target() {
        let labels = image_labels(BuildTarget::Debug);
        assert_eq!(labels.get(BUILD_TARGET_LABEL).map(String::as_str), Some("debug"));
        assert!(image_labels_match(&labels));
        assert!(!image_labels_match(&HashMap::new()));
    }

    #[test]
    fn format_build_error_includes_recent_logs() {
        let mut logs = VecDeque::new();
        logs.push_back("Step 1/5 : FROM ubuntu:22.04".to_string());
        logs.push_back("E: Unable to fetch some archives".to_string());

        let result = format_build_error_with_context(
            "Build failed: exit code 100",
            &logs,
            &VecDeque::new(),
            &VecDeque::new(),
        );
        assert!(result.contains("Build failed: exit code 100"));
        assert!(result.contains("Recent build output:"));
        assert!(result.contains("Unable to fetch"));
    }

    #[test]
    fn format_build_error_handles_empty_logs() {
        let result = format_build_error_with_context(
            "Stream error",
            &VecDeque::new(),
            &VecDeque::new(),
            &VecDeque::new(),
        );
        assert!(result.contains("No build output was received"));
        assert!(!result.contains("Recent build output:"));
    }

    #[test]
    fn format_build_error_suggests_package_fix() {
        let result = format_build_error_with_context(
            "E: Unable to locate package google-chrome-stable",
            &VecDeque::new(),
            &VecDeque::new(),
            &VecDeque::new(),
        );
        assert!(result.contains("package lists in the config file"));
    }

    #[test]
    fn format_build_error_shows_scrolled_off_errors() {
        let mut recent = VecDeque::new();
        recent.push_back("Setting up fontconfig".to_string());
        let mut errors = VecDeque::new();
        errors.push_back("error: debugpy wheel failed".to_string());

        let result =
            format_build_error_with_context("Build failed", &recent, &errors, &VecDeque::new());
        assert!(result.contains("Potential errors detected during build:"));
        assert!(result.contains("debugpy wheel failed"));
    }

    #[test]
    fn is_error_line_detects_errors() {
        assert!(is_error_line("E: Unable to locate package foo"));
        assert!(is_error_line("mv: cannot stat '/wptagent/wptagent.py'"));
        assert!(!is_error_line("Setting up tzdata"));
    }
}

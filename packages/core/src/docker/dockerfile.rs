//! Dockerfile rendering
//!
//! The Dockerfile is generated from the [`BuildPlan`] rather than kept as a
//! static asset, so the offline snapshot model and the daemon build always
//! describe the same layers.
//!
//! Stages are named after their build target (`production`, `debug`). There
//! is deliberately no trailing stage re-declaring production: the builder
//! always passes an explicit `target`, and the default target is resolved in
//! [`crate::image::resolve_target`].

use crate::image::{BuildPlan, LayerOp, PackageManager, StageBase};
use std::fmt::Write as _;

/// Build argument carrying the timezone identifier
pub const TIMEZONE_BUILD_ARG: &str = "TIMEZONE";

/// Label recording which target an image was built for
pub const BUILD_TARGET_LABEL: &str = "wptagent.build-target";

const HEADER: &str = "# syntax=docker/dockerfile:1\n# Generated by wptagent-image. Do not edit by hand.\n";

/// Render the multi-stage Dockerfile for a plan
pub fn render_dockerfile(plan: &BuildPlan, default_timezone: &str) -> String {
    let mut out = String::from(HEADER);

    for stage in plan.stages() {
        out.push('\n');
        match &stage.base {
            StageBase::Image(image) => {
                let _ = writeln!(out, "FROM {image} AS {}", stage.target.stage_name());
                let _ = writeln!(out, "ARG {TIMEZONE_BUILD_ARG}={default_timezone}");
                out.push_str("ENV DEBIAN_FRONTEND=noninteractive\n");
            }
            StageBase::Stage(parent) => {
                let _ = writeln!(
                    out,
                    "FROM {} AS {}",
                    parent.stage_name(),
                    stage.target.stage_name()
                );
            }
        }
        for op in &stage.ops {
            out.push_str(&render_op(op));
        }
    }

    out
}

fn render_op(op: &LayerOp) -> String {
    match op {
        LayerOp::AddAptSource {
            name,
            key_url,
            repository,
        } => format!(
            "RUN apt-get update \\\n    \
             && apt-get install -y --no-install-recommends ca-certificates curl gnupg \\\n    \
             && curl -fsSL {key_url} | gpg --dearmor -o /usr/share/keyrings/{name}.gpg \\\n    \
             && echo \"deb [signed-by=/usr/share/keyrings/{name}.gpg] {repository}\" > /etc/apt/sources.list.d/{name}.list \\\n    \
             && rm -rf /var/lib/apt/lists/*\n"
        ),
        LayerOp::InstallPackages { manager, packages } => render_install(*manager, packages),
        LayerOp::InstallRequirements { from } => format!(
            "COPY {from} /tmp/requirements.txt\n\
             RUN python3 -m pip install --no-cache-dir -r /tmp/requirements.txt\n"
        ),
        LayerOp::SetTimezone => format!(
            "RUN ln -fs /usr/share/zoneinfo/${{{arg}}} /etc/localtime \\\n    \
             && echo \"${{{arg}}}\" > /etc/timezone \\\n    \
             && dpkg-reconfigure -f noninteractive tzdata\n",
            arg = TIMEZONE_BUILD_ARG
        ),
        LayerOp::RebuildFontCache => "RUN fc-cache -f\n".to_string(),
        LayerOp::CopyFile { from, to, mode } => match mode {
            Some(mode) => format!("COPY --chmod={mode:04o} {from} {to}\n"),
            None => format!("COPY {from} {to}\n"),
        },
        LayerOp::CopyTree { from, to } => format!(
            "COPY {}/ {}/\n",
            from.trim_end_matches('/'),
            to.trim_end_matches('/')
        ),
        LayerOp::SetWorkdir { path } => format!("WORKDIR {path}\n"),
        LayerOp::SubstituteFile {
            path,
            replacement,
            preserve_as,
        } => format!(
            "RUN test -f {path} && test ! -e {preserve_as} && mv {path} {preserve_as}\nCOPY {replacement} {path}\n"
        ),
        LayerOp::SetEntrypoint { init, command } => format!(
            "ENTRYPOINT {}\nCMD {}\n",
            exec_form(init),
            exec_form(command)
        ),
    }
}

fn render_install(manager: PackageManager, packages: &[String]) -> String {
    let list = packages.join(" \\\n        ");
    match manager {
        PackageManager::Apt => format!(
            "RUN apt-get update \\\n    \
             && apt-get install -y --no-install-recommends \\\n        {list} \\\n    \
             && rm -rf /var/lib/apt/lists/*\n"
        ),
        PackageManager::Npm => format!("RUN npm install -g \\\n        {list}\n"),
        PackageManager::Pip => format!("RUN python3 -m pip install --no-cache-dir \\\n        {list}\n"),
    }
}

/// JSON exec form, e.g. `["/bin/bash", "/wptagent/entrypoint.sh"]`
fn exec_form(args: &[String]) -> String {
    let quoted: Vec<String> = args
        .iter()
        .map(|arg| serde_json::Value::String(arg.clone()).to_string())
        .collect();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn rendered() -> String {
        render_dockerfile(&BuildPlan::from_config(&Config::default()), "Etc/UTC")
    }

    #[test]
    fn stages_are_named_after_targets() {
        let dockerfile = rendered();
        assert!(dockerfile.contains("FROM ubuntu:22.04 AS production\n"));
        assert!(dockerfile.contains("FROM production AS debug\n"));
    }

    #[test]
    fn no_stage_follows_debug() {
        let dockerfile = rendered();
        let debug_at = dockerfile.find("AS debug").unwrap();
        assert!(!dockerfile[debug_at..].contains("\nFROM "));
    }

    #[test]
    fn debug_stage_installs_debugpy_and_swaps_script() {
        let dockerfile = rendered();
        let debug = &dockerfile[dockerfile.find("AS debug").unwrap()..];
        assert!(debug.contains("pip install --no-cache-dir \\\n        debugpy\n"));
        assert!(debug.contains(
            "RUN test -f /wptagent/wptagent.py && test ! -e /wptagent/wptagent_starter.py \
             && mv /wptagent/wptagent.py /wptagent/wptagent_starter.py\n"
        ));
        assert!(debug.contains("COPY agent/wptagent_debug.py /wptagent/wptagent.py\n"));
    }

    #[test]
    fn timezone_is_a_build_argument() {
        let dockerfile = rendered();
        assert!(dockerfile.contains("ARG TIMEZONE=Etc/UTC\n"));
        assert!(dockerfile.contains("/usr/share/zoneinfo/${TIMEZONE} /etc/localtime"));
    }

    #[test]
    fn non_default_signals_are_passed_to_init() {
        let config = Config {
            forward_signals: vec!["TERM".to_string(), "INT".to_string()],
            ..Config::default()
        };
        let dockerfile = render_dockerfile(&BuildPlan::from_config(&config), "Etc/UTC");
        assert!(dockerfile.contains(
            "ENTRYPOINT [\"/usr/local/bin/wpt-init\", \"--signal\", \"TERM\", \"--signal\", \"INT\", \"--\"]\n"
        ));
    }

    #[test]
    fn entrypoint_uses_init_exec_form() {
        let dockerfile = rendered();
        assert!(dockerfile.contains("ENTRYPOINT [\"/usr/local/bin/wpt-init\", \"--\"]\n"));
        assert!(dockerfile.contains(
            "CMD [\"/bin/bash\", \"/wptagent/docker/linux-headless/entrypoint.sh\"]\n"
        ));
        assert!(dockerfile.contains("COPY --chmod=0755 init/wpt-init /usr/local/bin/wpt-init\n"));
    }
}

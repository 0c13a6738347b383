//! Plan command implementation
//!
//! Shows the stages and layer operations that make up a build target.

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, Table};
use wptagent_image_core::Config;
use wptagent_image_core::image::{BuildPlan, BuildTarget, LayerOp, StageBase, resolve_target};

/// Arguments for the plan command
#[derive(Args)]
pub struct PlanArgs {
    /// Build target (default: config default_target, then production)
    #[arg(long, value_enum)]
    pub target: Option<BuildTarget>,

    /// Output the stage chain as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn cmd_plan(args: &PlanArgs, config: &Config) -> Result<()> {
    let plan = BuildPlan::from_config(config);
    plan.validate()?;
    let target = resolve_target(args.target, Some(config.default_target));
    let chain = plan.stage_chain(target)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&chain)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Stage", "#", "Operation"]);
    for stage in &chain {
        let base = match &stage.base {
            StageBase::Image(image) => format!("FROM {image}"),
            StageBase::Stage(parent) => format!("FROM {parent}"),
        };
        table.add_row(vec![
            Cell::new(stage.target).fg(Color::Cyan),
            Cell::new(""),
            Cell::new(base),
        ]);
        for (index, op) in stage.ops.iter().enumerate() {
            let cell = Cell::new(op.describe());
            let cell = match op {
                LayerOp::SubstituteFile { .. } => cell.fg(Color::Yellow),
                _ => cell,
            };
            table.add_row(vec![Cell::new(""), Cell::new(index + 1), cell]);
        }
    }
    println!("{table}");
    println!();
    println!(
        "Target: {}  Image: {}",
        target,
        config.image_reference(target, None)
    );
    Ok(())
}

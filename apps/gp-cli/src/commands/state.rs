// state.rs — Reading and writing policy state.

use anyhow::Context as _;
use gp_policy::{options_from_json, Backend, InferenceTrace, OptionValues, PolicyState};
use serde::Serialize;

use super::{find_policy, Context};

#[derive(Serialize)]
struct TraceOutput<'a> {
    source: Option<Backend>,
    read_errors: &'a [String],
    trace: Option<&'a InferenceTrace>,
}

pub fn show(ctx: &Context, policy_id: &str, trace: bool) -> anyhow::Result<()> {
    let catalog = ctx.catalog();
    let policy = find_policy(&catalog, policy_id)?;

    if trace {
        // Traces the backend the configured read precedence picks.
        let (report, trace) = ctx.editor().read_with_trace(policy);
        if ctx.json {
            return ctx.print_json(&TraceOutput {
                source: report.source,
                read_errors: &report.read_errors,
                trace: trace.as_ref(),
            });
        }
        for error in &report.read_errors {
            eprintln!("warning: {error}");
        }
        let Some(trace) = trace else {
            anyhow::bail!("no backend could be read for {}", policy.id);
        };
        if let Some(source) = report.source {
            println!("source: {source:?}");
        }
        for step in &trace.steps {
            println!(
                "{:<24} {:<32} enabled={} disabled={}",
                step.check, step.outcome, step.enabled, step.disabled
            );
        }
        println!("=> {}", trace.state);
        return Ok(());
    }

    let report = ctx.editor().read(policy);
    if ctx.json {
        return ctx.print_json(&report);
    }
    println!("{}: {}", policy.id, report.state);
    for (element, value) in &report.options {
        println!("  {element} = {}", serde_json::to_string(value)?);
    }
    for error in &report.read_errors {
        eprintln!("warning: {error}");
    }
    Ok(())
}

pub fn set(
    ctx: &Context,
    policy_id: &str,
    state: &str,
    options: Option<&str>,
) -> anyhow::Result<()> {
    let catalog = ctx.catalog();
    let policy = find_policy(&catalog, policy_id)?;
    let target: PolicyState = state.parse().map_err(anyhow::Error::msg)?;
    let options = match options {
        Some(text) => {
            let json: serde_json::Value =
                serde_json::from_str(text).context("--options is not valid JSON")?;
            options_from_json(&policy.definition, &json)?
        }
        None => OptionValues::new(),
    };

    let mut editor = ctx.editor();
    let outcome = editor.apply(policy, target, &options)?;
    for warning in &outcome.warnings {
        eprintln!("warning: {warning}");
    }
    if !outcome.mirrored {
        anyhow::bail!(
            "policy file {} was not updated",
            ctx.config.policy_file(ctx.scope).display()
        );
    }
    if ctx.json {
        return ctx.print_json(&outcome);
    }
    println!("{} set to {} ({})", policy.id, target, outcome.change_id);
    Ok(())
}

// dump.rs — List the raw entries of a policy file.

use std::path::Path;

use anyhow::Context as _;
use gp_registry::{PolStore, TypedValue};
use serde::Serialize;

use super::Context;

#[derive(Serialize)]
struct DumpEntry {
    key: String,
    value_name: String,
    value: TypedValue,
}

pub fn execute(ctx: &Context, file: &Path) -> anyhow::Result<()> {
    let store = PolStore::load(file).with_context(|| format!("reading {}", file.display()))?;
    let entries: Vec<DumpEntry> = store
        .entries()
        .into_iter()
        .map(|e| DumpEntry {
            value: TypedValue::decode(e.kind, &e.data),
            key: e.key,
            value_name: e.value_name,
        })
        .collect();

    if ctx.json {
        return ctx.print_json(&entries);
    }
    if entries.is_empty() {
        println!("{} has no entries", file.display());
    }
    for entry in &entries {
        let value = match &entry.value {
            TypedValue::String(s) => format!("REG_SZ {s:?}"),
            TypedValue::ExpandString(s) => format!("REG_EXPAND_SZ {s:?}"),
            TypedValue::U32(n) => format!("REG_DWORD {n}"),
            TypedValue::U64(n) => format!("REG_QWORD {n}"),
            TypedValue::MultiString(items) => format!("REG_MULTI_SZ {items:?}"),
            TypedValue::Bytes(bytes) => format!("REG_BINARY {} bytes", bytes.len()),
        };
        println!("{}\\{} = {}", entry.key, entry.value_name, value);
    }
    Ok(())
}

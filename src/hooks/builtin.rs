//! Record helpers for hooks, and the project hooks shipped with the default export map

use super::{AfterContext, BeforeContext, HookRegistry};
use crate::error::CompileResult;
use crate::schema::Phase;
use crate::types::{RowRecord, Table, Value};
use crate::writer::{Entry, TextMode, WriteMode};
use anyhow::bail;
use tracing::info;

/// Message tips sheet of the default export map
pub const MESSAGE_SHEET: &str = "消息提示表";
pub const MESSAGE_REVERSED_FILE: &str = "message_reversed.lua";

/// Values of every field whose key starts with `prefix`, in field order
pub fn collect_prefixed(record: &RowRecord, prefix: &str) -> Value {
    let items = record
        .iter()
        .filter(|(k, _)| k.starts_with(prefix))
        .map(|(_, v)| v.clone())
        .collect();
    Value::Table(Table::List(items))
}

/// Map built from paired fields: `<key_prefix>N` value → `<value_prefix>N` value
pub fn pair_prefixed(record: &RowRecord, key_prefix: &str, value_prefix: &str) -> anyhow::Result<Value> {
    let mut table = Table::empty();
    for (k, v) in record {
        let Some(suffix) = k.strip_prefix(key_prefix) else {
            continue;
        };
        let value_name = format!("{}{}", value_prefix, suffix);
        match record.get(&value_name) {
            Some(paired) => table.insert(v.clone(), paired.clone()),
            None => bail!(
                "no field {} paired with {}; check the sheet has it and that it is exported",
                value_name,
                k
            ),
        }
    }
    Ok(Value::Table(table))
}

/// Drop every field whose key starts with one of `prefixes`
pub fn remove_prefixed(record: &mut RowRecord, prefixes: &[&str]) {
    record.retain(|k, _| !prefixes.iter().any(|p| k.starts_with(p)));
}

/// Writer entries for the named fields; names missing from the record are skipped
pub fn writer_entries(record: &RowRecord, key_names: &[&str], value_names: &[&str]) -> (Vec<Entry>, Vec<Entry>) {
    let pick = |names: &[&str]| {
        names
            .iter()
            .filter_map(|name| record.get(*name).map(|v| Entry::new(*name, v.clone())))
            .collect::<Vec<_>>()
    };
    (pick(key_names), pick(value_names))
}

/// Fold `item_id_N`/`item_num_N` columns into `item_ids` and `item_map`
fn fold_message_items(ctx: &mut BeforeContext<'_>) -> anyhow::Result<()> {
    for record in ctx.rows.iter_mut() {
        let ids = collect_prefixed(record, "item_id_");
        let map = pair_prefixed(record, "item_id_", "item_num_")?;
        record.insert("item_ids".to_string(), ids);
        record.insert("item_map".to_string(), map);
        remove_prefixed(record, &["item_id_", "item_num_"]);
    }
    Ok(())
}

/// Emit `message_reversed.lua`: message enum → message id
fn write_reversed_messages(ctx: &AfterContext<'_>) -> anyhow::Result<()> {
    info!("generating {}", MESSAGE_REVERSED_FILE);
    let mut writer = ctx.writer(MESSAGE_REVERSED_FILE)?;
    for record in ctx.rows(MESSAGE_SHEET)? {
        let (keys, values) = writer_entries(record, &["enum"], &["id"]);
        writer.write(&keys, &values, WriteMode::NameOmitted, TextMode::WithoutBraces)?;
    }
    writer.dump_to_file()?;
    Ok(())
}

/// Register the hooks that go with the default export map
pub fn register_project_hooks(registry: &mut HookRegistry) -> CompileResult<()> {
    registry
        .register_before(
            Phase::ServerBefore,
            "fold_message_items",
            &[MESSAGE_SHEET],
            fold_message_items,
        )?
        .register_after(
            Phase::ServerAfter,
            "write_reversed_messages",
            &[MESSAGE_SHEET],
            write_reversed_messages,
        )?;
    Ok(())
}

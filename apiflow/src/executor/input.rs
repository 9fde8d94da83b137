//! Construction of a node's input from its dependencies' outputs.

use crate::core::{Value, ValueMap};

/// Merges dependency outputs into one input mapping.
///
/// Each dependency contributes its whole output under its own node id, and,
/// when that output holds a mapping under `"data"`, every key of that mapping
/// at the top level. Dependencies are visited in ascending node id, so for a
/// flattened key shared by several dependencies the smallest id wins. A
/// dependency id always takes precedence over a flattened key of the same
/// name. The result is independent of the order `outputs` is supplied in.
pub fn merge_inputs<'a, I>(outputs: I) -> ValueMap
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    let mut sorted: Vec<(&str, &Value)> = outputs.into_iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted.dedup_by(|a, b| a.0 == b.0);

    let mut input = ValueMap::new();
    for (_, output) in &sorted {
        if let Some(data) = output.data_map() {
            for (key, value) in data {
                input.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }
    for (id, output) in sorted {
        input.insert(id.to_string(), output.clone());
    }
    input
}

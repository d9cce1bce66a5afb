use super::Context;
use crate::output::{print_json, print_table};
use zzcollab_core::variant;

/// `zzcollab variants`: list the catalog in its fixed order.
pub fn run(ctx: &Context) -> anyhow::Result<()> {
    let variants = variant::all_variants();
    if ctx.json {
        return print_json(&variants);
    }

    let rows: Vec<Vec<String>> = variants
        .iter()
        .map(|v| {
            vec![
                v.id.to_string(),
                v.role.to_string(),
                v.base_image.to_string(),
                v.arch
                    .iter()
                    .map(|a| a.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
                v.description.to_string(),
            ]
        })
        .collect();
    print_table(&["VARIANT", "ROLE", "BASE IMAGE", "ARCH", "DESCRIPTION"], &rows);
    Ok(())
}

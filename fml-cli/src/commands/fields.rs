//! Fields command - list the catalog.

use anyhow::Result;
use fml_core::Width;

/// Render every known field, as a table or as JSON.
pub fn render<W: Width>(json: bool) -> Result<String> {
    let fields = W::catalog().fields()?;

    if json {
        let rows: Vec<serde_json::Value> = fields
            .iter()
            .map(|(name, id)| {
                serde_json::json!({
                    "name": name,
                    "type": id.field_type().keyword(),
                    "number": id.number(),
                    "id": id.raw(),
                })
            })
            .collect();
        return Ok(serde_json::to_string_pretty(&rows)?);
    }

    let width = fields.iter().map(|(name, _)| name.len()).max().unwrap_or(4).max(4);
    let mut out = format!("{:<width$}  {:<8}  {:>8}  {:>10}\n", "NAME", "TYPE", "NUMBER", "ID");
    out.push_str(&format!("{:-<1$}\n", "", width + 32));
    for (name, id) in &fields {
        out.push_str(&format!(
            "{:<width$}  {:<8}  {:>8}  {:>10}\n",
            name,
            id.field_type().keyword(),
            id.number(),
            id.raw()
        ));
    }
    out.push_str(&format!("Total: {} fields ({})\n", fields.len(), W::NAME));
    Ok(out)
}

/// Run the fields command.
pub fn run<W: Width>(json: bool) -> Result<()> {
    print!("{}", render::<W>(json)?);
    Ok(())
}

//! Bills command - list stored bills

use anyhow::Result;
use colored::Colorize;
use semidao_core::VENDOR;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let bills = ctx.repository.list_bills(VENDOR)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&bills)?);
        return Ok(());
    }

    if bills.is_empty() {
        println!("{}", "No bills stored yet. Use 'semidao run' to collect them.".yellow());
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Date", "Reference", "Amount", "Linked", "Document"]);

    for stored in &bills {
        let linked = if stored.linked_transaction_id.is_some() {
            "yes".green().to_string()
        } else {
            "-".dimmed().to_string()
        };
        table.add_row(vec![
            stored.bill.date.format("%Y-%m-%d").to_string(),
            stored.bill.reference.clone(),
            format!("{:.2}", stored.bill.amount),
            linked,
            stored.document_path.clone().unwrap_or_default(),
        ]);
    }

    println!("{}", table);
    println!("{} bill(s) in {}", bills.len(), ctx.config.documents_dir.display());
    Ok(())
}

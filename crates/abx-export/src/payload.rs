//! Form payload builders for the selection and export POSTs.
//!
//! The selection POST replays what the browser sends when every row on the
//! result list is ticked: one `id` field per item plus zeroed sibling
//! fields the page's own form carries, then the joined id batch. Field
//! order is kept exactly as the browser emits it.

use crate::definition::ExportConfig;

/// Selection payload for the product result list.
#[must_use]
pub fn product_selection_payload(item_ids: &[String]) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> =
        vec![("art2".to_string(), "selectexportauswahl".to_string())];
    for item_id in item_ids {
        let id = item_id.trim();
        if id.is_empty() {
            continue;
        }
        form.push(("id".to_string(), id.to_string()));
        form.push((format!("Bestand_{id}"), "0".to_string()));
        form.push((format!("ABestand_{id}"), "0".to_string()));
    }
    form.extend([
        ("art".to_string(), "selectexportauswahl".to_string()),
        ("updtart".to_string(), String::new()),
        ("allmyupdtids".to_string(), item_ids.join(",")),
        ("rsposition".to_string(), "0".to_string()),
        ("spoid".to_string(), "0".to_string()),
        ("ListerHistory_Stammid".to_string(), String::new()),
    ]);
    form
}

/// Selection payload for the lister result list.
#[must_use]
pub fn lister_selection_payload(item_ids: &[String]) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = vec![
        ("art2".to_string(), "selectexportauswahl".to_string()),
        ("Lister_Button".to_string(), "Ausf\u{fc}hren".to_string()),
    ];
    for item_id in item_ids {
        let id = item_id.trim();
        if id.is_empty() {
            continue;
        }
        form.push(("id".to_string(), id.to_string()));
        form.push((format!("said_{id}"), "0".to_string()));
        form.push((format!("vtid_{id}"), "0".to_string()));
        form.push((format!("Menge_{id}"), "0".to_string()));
        form.push((format!("vid_{id}"), "0".to_string()));
    }
    form.extend([
        ("art".to_string(), "selectexportauswahl".to_string()),
        ("updtart".to_string(), String::new()),
        ("allmyupdtids".to_string(), item_ids.join(",")),
        ("rsposition".to_string(), "0".to_string()),
        ("mehrfachauswahl".to_string(), "1".to_string()),
        ("arttmp".to_string(), String::new()),
        ("idtmp".to_string(), String::new()),
        ("lister".to_string(), "ebay".to_string()),
        ("CopyToListerIds".to_string(), String::new()),
    ]);
    form
}

/// Export payload for the product flavor, posted to the import/export page.
#[must_use]
pub fn product_export_payload(item_ids: &[String], config: &ExportConfig) -> Vec<(String, String)> {
    let mut form = Vec::new();
    if let Some(expprod) = &config.expprod {
        form.push(("expprod".to_string(), expprod.clone()));
    }
    form.push(("ExportFormatID".to_string(), config.export_format_id.clone()));
    form.extend([
        ("ExportEncoding".to_string(), config.export_encoding.clone()),
        (
            "saveExportEncoding".to_string(),
            config.save_export_encoding.clone(),
        ),
        ("id".to_string(), item_ids.join(",")),
        ("art".to_string(), "export".to_string()),
        ("definition".to_string(), config.definition_id.clone()),
        ("isProductExport".to_string(), "1".to_string()),
    ]);
    form
}

/// Export payload for the lister flavor. No encoding persistence and no
/// product marker; the server distinguishes the flavors by these fields.
#[must_use]
pub fn lister_export_payload(item_ids: &[String], config: &ExportConfig) -> Vec<(String, String)> {
    let mut form = Vec::new();
    if let Some(expprod) = &config.expprod {
        form.push(("expprod".to_string(), expprod.clone()));
    }
    form.extend([
        ("ExportEncoding".to_string(), config.export_encoding.clone()),
        ("ExportFormatID".to_string(), config.export_format_id.clone()),
        ("id".to_string(), item_ids.join(",")),
        ("art".to_string(), "export".to_string()),
        ("definition".to_string(), config.definition_id.clone()),
    ]);
    form
}

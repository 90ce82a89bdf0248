//! Export definition discovery.
//!
//! The import/export settings page carries a `<select name="definition">`
//! listing the merchant's saved export definitions. The id is resolved
//! once per account run, preferring the definition whose label matches the
//! flavor, and is read-only afterward.

use abx_session::markup::{self, SelectOption};
use abx_session::Session;
use tracing::{debug, warn};

use crate::driver::ExportKind;
use crate::error::ExportError;

pub const EXPORT_ENDPOINT: &str = "/afterbuy/im-export.aspx";

const DEFAULT_EXPPROD: &str = "3";
const DEFAULT_EXPORT_ENCODING: &str = "1";
const DEFAULT_SAVE_EXPORT_ENCODING: &str = "1";
/// Known-good lister definition used when auto-detection comes up empty.
const DEFAULT_LISTER_DEFINITION: &str = "72404";

/// The resolved export parameters for one account run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub definition_id: String,
    pub export_format_id: String,
    pub export_encoding: String,
    pub save_export_encoding: String,
    pub expprod: Option<String>,
}

/// CLI-level overrides; anything left `None` is auto-resolved.
#[derive(Debug, Clone, Default)]
pub struct ExportOverrides {
    pub definition_id: Option<String>,
    pub export_format_id: Option<String>,
    pub export_encoding: Option<String>,
    pub save_export_encoding: Option<String>,
    pub expprod: Option<String>,
}

/// Picks the definition whose label contains `preferred_label`
/// (case-insensitive), else the first selectable option. The placeholder
/// value `0` is never a definition.
#[must_use]
pub fn choose_definition(options: &[SelectOption], preferred_label: &str) -> Option<String> {
    let preferred = preferred_label.to_lowercase();
    let mut fallback: Option<&SelectOption> = None;
    for option in options {
        let value = option.value.trim();
        if value.is_empty() || value == "0" {
            continue;
        }
        if option.label.to_lowercase().contains(&preferred) {
            return Some(value.to_string());
        }
        if fallback.is_none() {
            fallback = Some(option);
        }
    }
    fallback.map(|option| option.value.trim().to_string())
}

/// Fetches the export settings page and picks a definition for the flavor.
///
/// # Errors
///
/// [`ExportError::SessionExpired`] when the page is the sign-in form,
/// [`ExportError::UnexpectedStatus`] on non-2xx, [`ExportError::Http`] on
/// network failure.
pub async fn detect_definition(
    session: &Session,
    preferred_label: &str,
) -> Result<Option<String>, ExportError> {
    let url = session.url(EXPORT_ENDPOINT);
    let page = session.get_page(&url, Some(&url)).await?;
    if !page.status.is_success() {
        return Err(ExportError::UnexpectedStatus {
            status: page.status.as_u16(),
            url,
        });
    }
    if markup::contains_login_form(&page.body) {
        return Err(ExportError::SessionExpired { url });
    }
    let options = markup::select_options(&page.body, "definition");
    Ok(choose_definition(&options, preferred_label))
}

/// Resolves the full export configuration, applying overrides first.
///
/// The product flavor has no safe default definition and fails with
/// [`ExportError::DefinitionNotFound`]; the lister flavor falls back to
/// the well-known default.
///
/// # Errors
///
/// Propagates [`detect_definition`] errors plus `DefinitionNotFound`.
pub async fn resolve_export_config(
    session: &Session,
    kind: ExportKind,
    overrides: &ExportOverrides,
) -> Result<ExportConfig, ExportError> {
    let definition_id = match &overrides.definition_id {
        Some(id) => id.clone(),
        None => {
            let detected = detect_definition(session, kind.preferred_definition_label()).await?;
            match (detected, kind) {
                (Some(id), _) => id,
                (None, ExportKind::Product) => return Err(ExportError::DefinitionNotFound),
                (None, ExportKind::Lister) => {
                    warn!(
                        fallback = DEFAULT_LISTER_DEFINITION,
                        "no lister definition detected, using the default"
                    );
                    DEFAULT_LISTER_DEFINITION.to_string()
                }
            }
        }
    };
    let config = ExportConfig {
        export_format_id: overrides
            .export_format_id
            .clone()
            .unwrap_or_else(|| definition_id.clone()),
        export_encoding: overrides
            .export_encoding
            .clone()
            .unwrap_or_else(|| DEFAULT_EXPORT_ENCODING.to_string()),
        save_export_encoding: overrides
            .save_export_encoding
            .clone()
            .unwrap_or_else(|| DEFAULT_SAVE_EXPORT_ENCODING.to_string()),
        expprod: Some(
            overrides
                .expprod
                .clone()
                .unwrap_or_else(|| DEFAULT_EXPPROD.to_string()),
        ),
        definition_id,
    };
    debug!(
        definition = %config.definition_id,
        format = %config.export_format_id,
        "export configuration resolved"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use abx_session::markup::SelectOption;

    use super::choose_definition;

    fn option(value: &str, label: &str) -> SelectOption {
        SelectOption {
            value: value.to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn preferred_label_wins_over_position() {
        let options = vec![
            option("0", "Bitte wählen"),
            option("11111", "AltExport"),
            option("22222", "ProdukteExport komplett"),
        ];
        assert_eq!(
            choose_definition(&options, "ProdukteExport").as_deref(),
            Some("22222")
        );
    }

    #[test]
    fn first_selectable_option_is_the_fallback() {
        let options = vec![option("0", "Bitte wählen"), option("11111", "Sonstiges")];
        assert_eq!(
            choose_definition(&options, "Lister").as_deref(),
            Some("11111")
        );
    }

    #[test]
    fn placeholder_only_select_yields_none() {
        let options = vec![option("0", "Bitte wählen")];
        assert_eq!(choose_definition(&options, "Lister"), None);
    }
}

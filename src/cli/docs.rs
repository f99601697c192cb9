//! Function documentation for the tarragon CLI

use super::CliError;
use crate::Registry;

/// Every registered name with its short description, one per line
pub fn function_list(registry: &Registry) -> String {
    let mut out = String::from("FUNCTIONS\n\n");
    for name in registry.get_names() {
        let description = registry
            .get(&name)
            .map(|f| f.short_description().to_string())
            .unwrap_or_default();
        out.push_str(&format!("  {name:<20}{description}\n"));
    }
    out.push_str(
        "\nRESERVED WORDS\n\n  cache true false if is each filter map reduce any all none data null\n",
    );
    out
}

/// Usage text of a single function
pub fn function_doc(registry: &Registry, name: &str) -> Result<String, CliError> {
    let function = registry
        .get(name)
        .ok_or_else(|| CliError::UnknownFunction(name.to_string()))?;

    let mut out = format!("{}\n\n  {}\n", function.name(), function.usage());
    if !function.short_description().is_empty() {
        out.push_str(&format!("\n  {}\n", function.short_description()));
    }
    if !function.aliases().is_empty() {
        out.push_str(&format!("\n  Aliases: {}\n", function.aliases().join(", ")));
    }
    if let Some(namespace) = function.namespace_identifier() {
        out.push_str(&format!("  Namespace: {namespace}\n"));
    }
    if let Some(module) = function.required_module() {
        out.push_str(&format!("  Module: {module}\n"));
    }
    Ok(out)
}
